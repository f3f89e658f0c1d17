pub mod snapshot;
pub mod types;

pub use snapshot::build_snapshot;
pub use types::*;

use std::future::Future;

use rusqlite::{params, Connection};

use crate::date_util::to_sql_timestamp;
use crate::error::Result;
use crate::query::period::PeriodWindow;
use crate::storage::repository::{self, timestamp_at};
use crate::storage::Database;

/// Scalar summaries over a window. One method per snapshot branch.
///
/// Implementations must bound each call; the store-backed implementation
/// does so through [`Database::read`].
pub trait AggregateReader: Send + Sync + 'static {
    fn cement_summary(
        &self,
        window: PeriodWindow,
    ) -> impl Future<Output = Result<CementSummary>> + Send;

    fn sand_summary(&self, window: PeriodWindow) -> impl Future<Output = Result<SandSummary>> + Send;

    fn production_summary(
        &self,
        window: PeriodWindow,
    ) -> impl Future<Output = Result<ProductionSummary>> + Send;

    fn sales_summary(&self, window: PeriodWindow)
        -> impl Future<Output = Result<SalesSummary>> + Send;

    fn payroll_summary(
        &self,
        window: PeriodWindow,
    ) -> impl Future<Output = Result<PayrollSummary>> + Send;
}

impl AggregateReader for Database {
    async fn cement_summary(&self, window: PeriodWindow) -> Result<CementSummary> {
        self.read(move |conn| Ok(cement_summary_sql(conn, &window)?))
            .await
    }

    async fn sand_summary(&self, window: PeriodWindow) -> Result<SandSummary> {
        self.read(move |conn| Ok(sand_summary_sql(conn, &window)?))
            .await
    }

    async fn production_summary(&self, window: PeriodWindow) -> Result<ProductionSummary> {
        self.read(move |conn| Ok(production_summary_sql(conn, &window)?))
            .await
    }

    async fn sales_summary(&self, window: PeriodWindow) -> Result<SalesSummary> {
        self.read(move |conn| Ok(sales_summary_sql(conn, &window)?))
            .await
    }

    async fn payroll_summary(&self, window: PeriodWindow) -> Result<PayrollSummary> {
        self.read(move |conn| Ok(payroll_summary_sql(conn, &window)?))
            .await
    }
}

/// Cement purchases grouped by cement type.
pub async fn cement_report(db: &Database, window: PeriodWindow) -> Result<MaterialReport> {
    let rows = db
        .read(move |conn| Ok(material_totals_sql(conn, &CEMENT, &window)?))
        .await?;
    Ok(MaterialReport::from_rows(window, rows))
}

/// Sand purchases grouped by sand type.
pub async fn sand_report(db: &Database, window: PeriodWindow) -> Result<MaterialReport> {
    let rows = db
        .read(move |conn| Ok(material_totals_sql(conn, &SAND, &window)?))
        .await?;
    Ok(MaterialReport::from_rows(window, rows))
}

/// Pay records overlapping `window`, with their summed pay.
pub async fn pay_report(db: &Database, window: PeriodWindow) -> Result<PayReport> {
    let records = db
        .read(move |conn| Ok(repository::list_pay_records_overlapping(conn, &window)?))
        .await?;
    let total_pay = records.iter().map(|r| r.computed_pay).sum();
    Ok(PayReport {
        window,
        records,
        total_pay,
    })
}

// ── Internal SQL helpers ───────────────────────────────────────────

/// Table and column names for one purchased material.
struct MaterialTables {
    purchases: &'static str,
    types: &'static str,
    type_fk: &'static str,
    unit_price: &'static str,
}

const CEMENT: MaterialTables = MaterialTables {
    purchases: "cement_stocks",
    types: "cement_types",
    type_fk: "cement_type_id",
    unit_price: "price_per_bag",
};

const SAND: MaterialTables = MaterialTables {
    purchases: "sand_purchases",
    types: "sand_types",
    type_fk: "sand_type_id",
    unit_price: "price_per_truck",
};

fn window_params(window: &PeriodWindow) -> (String, String) {
    (to_sql_timestamp(&window.start), to_sql_timestamp(&window.end))
}

fn material_totals_sql(
    conn: &Connection,
    tables: &MaterialTables,
    window: &PeriodWindow,
) -> std::result::Result<Vec<MaterialTypeTotal>, rusqlite::Error> {
    let MaterialTables {
        purchases,
        types,
        type_fk,
        unit_price,
    } = tables;
    let sql = format!(
        "SELECT t.id, t.name,
                SUM(p.quantity),
                SUM(p.quantity * p.{unit_price}),
                AVG(p.{unit_price}),
                MIN(p.purchase_date),
                MAX(p.purchase_date)
         FROM {purchases} p
         JOIN {types} t ON t.id = p.{type_fk}
         WHERE p.purchase_date BETWEEN ?1 AND ?2
         GROUP BY t.id, t.name
         ORDER BY t.name"
    );
    let (start, end) = window_params(window);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok(MaterialTypeTotal {
            type_id: row.get(0)?,
            type_name: row.get(1)?,
            total_quantity: row.get(2)?,
            total_price: row.get(3)?,
            avg_unit_price: row.get(4)?,
            first_purchase: timestamp_at(row, 5)?,
            last_purchase: timestamp_at(row, 6)?,
        })
    })?;
    rows.collect()
}

fn cement_summary_sql(
    conn: &Connection,
    window: &PeriodWindow,
) -> std::result::Result<CementSummary, rusqlite::Error> {
    let (start, end) = window_params(window);
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(quantity), 0),
                COALESCE(SUM(quantity * price_per_bag), 0.0)
         FROM cement_stocks
         WHERE purchase_date BETWEEN ?1 AND ?2",
        params![start, end],
        |row| {
            Ok(CementSummary {
                total_stock: row.get::<_, i64>(0)? as u64,
                total_quantity: row.get(1)?,
                total_price: row.get(2)?,
            })
        },
    )
}

fn sand_summary_sql(
    conn: &Connection,
    window: &PeriodWindow,
) -> std::result::Result<SandSummary, rusqlite::Error> {
    let (start, end) = window_params(window);
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(quantity), 0),
                COALESCE(SUM(quantity * price_per_truck), 0.0)
         FROM sand_purchases
         WHERE purchase_date BETWEEN ?1 AND ?2",
        params![start, end],
        |row| {
            Ok(SandSummary {
                total_purchase: row.get::<_, i64>(0)? as u64,
                total_quantity: row.get(1)?,
                total_price: row.get(2)?,
            })
        },
    )
}

fn production_summary_sql(
    conn: &Connection,
    window: &PeriodWindow,
) -> std::result::Result<ProductionSummary, rusqlite::Error> {
    let (start, end) = window_params(window);
    conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0)
         FROM productions
         WHERE production_date BETWEEN ?1 AND ?2",
        params![start, end],
        |row| {
            Ok(ProductionSummary {
                total_production: row.get(0)?,
            })
        },
    )
}

fn sales_summary_sql(
    conn: &Connection,
    window: &PeriodWindow,
) -> std::result::Result<SalesSummary, rusqlite::Error> {
    let (start, end) = window_params(window);
    conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0), COALESCE(SUM(total_price), 0.0)
         FROM transactions
         WHERE purchase_date BETWEEN ?1 AND ?2",
        params![start, end],
        |row| {
            Ok(SalesSummary {
                total_quantity: row.get(0)?,
                total_income: row.get(1)?,
            })
        },
    )
}

/// Pay is attributed to the window containing the week's last day. Compared
/// by calendar day since month windows end at whole seconds.
fn payroll_summary_sql(
    conn: &Connection,
    window: &PeriodWindow,
) -> std::result::Result<PayrollSummary, rusqlite::Error> {
    let start = window.start_date().format("%Y-%m-%d").to_string();
    let end = window.end_date().format("%Y-%m-%d").to_string();
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(computed_pay), 0.0)
         FROM employee_pay
         WHERE substr(period_end, 1, 10) BETWEEN ?1 AND ?2",
        params![start, end],
        |row| {
            Ok(PayrollSummary {
                total_records: row.get::<_, i64>(0)? as u64,
                total_pay: row.get(1)?,
            })
        },
    )
}
