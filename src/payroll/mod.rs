pub mod scheduler;

pub use scheduler::{start_scheduler, Clock, LocalClock, RecomputeJob, SchedulerHandle, WeeklyTrigger};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::aggregate::AggregateReader;
use crate::error::Result;
use crate::query::period::PeriodWindow;
use crate::records::PeriodPayRecord;
use crate::storage::repository::{self, InsertOnce};
use crate::storage::Database;

/// Pay per brick produced.
pub const DEFAULT_PAY_RATE: f64 = 450.0;

/// What a firing did for its week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum FiringOutcome {
    /// A new record was stored.
    Recorded(PeriodPayRecord),
    /// The week already had a record; it was left as is.
    AlreadyRecorded(PeriodPayRecord),
}

impl FiringOutcome {
    pub fn record(&self) -> &PeriodPayRecord {
        match self {
            FiringOutcome::Recorded(r) | FiringOutcome::AlreadyRecorded(r) => r,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, FiringOutcome::Recorded(_))
    }
}

pub fn compute_pay(total_production_units: i64, rate: f64) -> f64 {
    total_production_units as f64 * rate
}

/// The store-backed weekly pay job.
///
/// A firing takes the last ISO week that has fully ended, sums the bricks
/// produced in it, multiplies by the per-brick rate and stores one pay
/// record for the week. A week never gets a second record: repeat firings
/// return the record already stored.
#[derive(Clone)]
pub struct PayrollJob {
    db: Database,
    rate: f64,
}

impl PayrollJob {
    pub fn new(db: Database, rate: f64) -> Self {
        Self { db, rate }
    }

    /// Compute and store pay for the latest week that ended at or before `at`.
    pub async fn fire_for(&self, at: NaiveDateTime) -> Result<FiringOutcome> {
        let window = PeriodWindow::last_completed_week(at);
        let total = self.db.production_summary(window).await?.total_production;
        let pay = compute_pay(total, self.rate);

        let inserted = self
            .db
            .write(move |conn| repository::insert_pay_record_once(conn, &window, total, pay))
            .await?;

        match inserted {
            InsertOnce::Inserted(record) => {
                log::info!(
                    "Recorded pay for {}: {} bricks, pay {:.2}",
                    window.label(),
                    record.total_production_units,
                    record.computed_pay
                );
                Ok(FiringOutcome::Recorded(record))
            }
            InsertOnce::Existing(record) => {
                log::warn!(
                    "Pay for {} was already recorded on {}; leaving it unchanged",
                    window.label(),
                    record.created_at
                );
                Ok(FiringOutcome::AlreadyRecorded(record))
            }
        }
    }
}

impl RecomputeJob for PayrollJob {
    async fn fire(&self, at: NaiveDateTime) -> Result<FiringOutcome> {
        self.fire_for(at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NewProduction;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn at(m: u32, day: u32, h: u32, min: u32) -> NaiveDateTime {
        d(m, day).and_hms_opt(h, min, 0).unwrap()
    }

    async fn record_production(db: &Database, when: NaiveDateTime, quantity: i64) {
        db.write(move |conn| {
            repository::insert_production(
                conn,
                &NewProduction {
                    quantity,
                    cement_used: 1.0,
                    sand_used: 0.1,
                    production_date: when,
                },
            )
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_compute_pay() {
        assert_eq!(compute_pay(120, DEFAULT_PAY_RATE), 54_000.0);
        assert_eq!(compute_pay(0, DEFAULT_PAY_RATE), 0.0);
    }

    #[tokio::test]
    async fn test_firing_records_week_pay() {
        let db = Database::open_memory().await.unwrap();
        record_production(&db, at(3, 11, 0, 0), 70).await;
        record_production(&db, d(3, 17).and_hms_opt(23, 59, 59).unwrap(), 50).await;
        // Next Monday belongs to the following week
        record_production(&db, at(3, 18, 0, 0), 1000).await;

        let job = PayrollJob::new(db, DEFAULT_PAY_RATE);
        let outcome = job.fire_for(at(3, 18, 0, 5)).await.unwrap();

        assert!(outcome.is_new());
        let record = outcome.record();
        assert_eq!(record.total_production_units, 120);
        assert_eq!(record.computed_pay, 54_000.0);
        assert_eq!(record.period_start, at(3, 11, 0, 0));
        assert_eq!(
            record.period_end,
            d(3, 17).and_hms_micro_opt(23, 59, 59, 999_999).unwrap()
        );
    }

    #[tokio::test]
    async fn test_saturday_firing_pays_sunday_production() {
        let db = Database::open_memory().await.unwrap();
        record_production(&db, at(3, 13, 9, 0), 100).await;

        let job = PayrollJob::new(db.clone(), DEFAULT_PAY_RATE);

        // Saturday night the week of the 11th is not over yet
        let early = job.fire_for(at(3, 16, 23, 59)).await.unwrap();
        assert!(early.record().period_end <= at(3, 16, 23, 59));
        assert_eq!(early.record().period_start, at(3, 4, 0, 0));
        assert_eq!(early.record().total_production_units, 0);

        record_production(&db, at(3, 17, 10, 0), 80).await;

        let next = job.fire_for(at(3, 23, 23, 59)).await.unwrap();
        assert!(next.is_new());
        assert_eq!(next.record().period_start, at(3, 11, 0, 0));
        assert_eq!(next.record().total_production_units, 180);
        assert_eq!(next.record().computed_pay, 81_000.0);
    }

    #[tokio::test]
    async fn test_repeat_firing_is_ignored() {
        let db = Database::open_memory().await.unwrap();
        record_production(&db, at(3, 12, 9, 0), 120).await;

        let job = PayrollJob::new(db.clone(), DEFAULT_PAY_RATE);
        let first = job.fire_for(at(3, 18, 0, 5)).await.unwrap();

        // More production is back-filled, then the job fires again for the same week
        record_production(&db, at(3, 13, 9, 0), 30).await;
        let second = job.fire_for(at(3, 20, 12, 0)).await.unwrap();

        assert!(!second.is_new());
        assert_eq!(second.record(), first.record());
        assert_eq!(second.record().computed_pay, 54_000.0);

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM employee_pay", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_consecutive_weeks_are_contiguous() {
        let db = Database::open_memory().await.unwrap();
        record_production(&db, at(3, 12, 9, 0), 10).await;
        record_production(&db, at(3, 19, 9, 0), 20).await;

        let job = PayrollJob::new(db, DEFAULT_PAY_RATE);
        let first = job.fire_for(at(3, 18, 0, 5)).await.unwrap();
        let second = job.fire_for(at(3, 25, 0, 5)).await.unwrap();
        let (a, b) = (first.record(), second.record());

        assert!(a.period_end < b.period_start);
        assert_eq!(
            b.period_start - a.period_end,
            chrono::Duration::microseconds(1)
        );
        assert_eq!(a.computed_pay, 4_500.0);
        assert_eq!(b.computed_pay, 9_000.0);
    }

    #[tokio::test]
    async fn test_week_with_no_production_records_zero() {
        let db = Database::open_memory().await.unwrap();
        let job = PayrollJob::new(db, DEFAULT_PAY_RATE);
        let outcome = job.fire_for(at(1, 6, 12, 0)).await.unwrap();
        assert_eq!(outcome.record().computed_pay, 0.0);
        assert_eq!(outcome.record().total_production_units, 0);
    }
}
