use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use super::types::AggregateSnapshot;
use super::AggregateReader;
use crate::error::{Error, Result};
use crate::query::period::PeriodWindow;

/// Number of concurrent summary branches in one snapshot.
pub const SNAPSHOT_BRANCHES: usize = 5;

/// Build every summary for `window` concurrently.
///
/// Each branch runs on its own task and owns its result slot; failures are
/// sent to a shared error channel. All branches are awaited before any
/// outcome is inspected, and none is cancelled when a sibling fails. If any
/// branch failed the first error received is returned and the other results
/// are dropped.
pub async fn build_snapshot<R>(reader: Arc<R>, window: PeriodWindow) -> Result<AggregateSnapshot>
where
    R: AggregateReader,
{
    let (err_tx, mut err_rx) = mpsc::channel::<Error>(SNAPSHOT_BRANCHES);

    let cement = spawn_branch(err_tx.clone(), {
        let reader = Arc::clone(&reader);
        async move { reader.cement_summary(window).await }
    });
    let sand = spawn_branch(err_tx.clone(), {
        let reader = Arc::clone(&reader);
        async move { reader.sand_summary(window).await }
    });
    let production = spawn_branch(err_tx.clone(), {
        let reader = Arc::clone(&reader);
        async move { reader.production_summary(window).await }
    });
    let sales = spawn_branch(err_tx.clone(), {
        let reader = Arc::clone(&reader);
        async move { reader.sales_summary(window).await }
    });
    let payroll = spawn_branch(err_tx, {
        let reader = Arc::clone(&reader);
        async move { reader.payroll_summary(window).await }
    });

    let (cement, sand, production, sales, payroll) =
        tokio::join!(cement, sand, production, sales, payroll);

    if let Ok(err) = err_rx.try_recv() {
        log::debug!("Snapshot for {window} failed: {err}");
        return Err(err);
    }

    Ok(AggregateSnapshot {
        window,
        cement: settle("cement", cement)?,
        sand: settle("sand", sand)?,
        production: settle("production", production)?,
        sales: settle("sales", sales)?,
        payroll: settle("payroll", payroll)?,
    })
}

fn spawn_branch<T, F>(errors: mpsc::Sender<Error>, branch: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        match branch.await {
            Ok(value) => Some(value),
            Err(e) => {
                // Capacity equals the branch count, so this never waits.
                let _ = errors.send(e).await;
                None
            }
        }
    })
}

fn settle<T>(branch: &str, joined: std::result::Result<Option<T>, JoinError>) -> Result<T> {
    match joined {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(Error::Other(format!("{branch} summary produced no result"))),
        Err(e) => Err(Error::Other(format!("{branch} summary task failed: {e}"))),
    }
}
