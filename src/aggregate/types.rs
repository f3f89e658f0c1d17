use chrono::NaiveDateTime;
use serde::Serialize;

use crate::query::period::PeriodWindow;

/// Cement purchases in a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CementSummary {
    /// Number of purchase rows.
    pub total_stock: u64,
    /// Bags bought.
    pub total_quantity: i64,
    pub total_price: f64,
}

/// Sand purchases in a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SandSummary {
    pub total_purchase: u64,
    /// Truckloads bought.
    pub total_quantity: i64,
    pub total_price: f64,
}

/// Bricks produced in a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionSummary {
    pub total_production: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_quantity: i64,
    pub total_income: f64,
}

/// Pay recorded for weeks ending in a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PayrollSummary {
    pub total_records: u64,
    pub total_pay: f64,
}

/// All five summaries over one window, built together or not at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub window: PeriodWindow,
    pub cement: CementSummary,
    pub sand: SandSummary,
    pub production: ProductionSummary,
    pub sales: SalesSummary,
    pub payroll: PayrollSummary,
}

/// One row of a grouped material report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialTypeTotal {
    pub type_id: i64,
    pub type_name: String,
    pub total_quantity: i64,
    /// Sum of `quantity * unit_price` over the underlying rows.
    pub total_price: f64,
    pub avg_unit_price: f64,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
}

/// Per-type purchase totals for cement or sand over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialReport {
    pub window: PeriodWindow,
    pub rows: Vec<MaterialTypeTotal>,
    /// Number of material types with at least one purchase.
    pub total_count: u64,
    pub total_quantity: i64,
    pub total_price: f64,
}

impl MaterialReport {
    pub fn from_rows(window: PeriodWindow, rows: Vec<MaterialTypeTotal>) -> Self {
        let total_quantity = rows.iter().map(|r| r.total_quantity).sum();
        let total_price = rows.iter().map(|r| r.total_price).sum();
        Self {
            window,
            total_count: rows.len() as u64,
            total_quantity,
            total_price,
            rows,
        }
    }
}

/// Pay records overlapping a window plus their total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayReport {
    pub window: PeriodWindow,
    pub records: Vec<crate::records::PeriodPayRecord>,
    pub total_pay: f64,
}

/// Production runs in a window with their total.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionReport {
    pub window: PeriodWindow,
    pub summary: ProductionSummary,
    pub runs: Vec<crate::records::Production>,
}

/// Sales in a window. `sales` may be capped; `total_count` is not.
#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub window: PeriodWindow,
    pub summary: SalesSummary,
    pub sales: Vec<crate::records::Sale>,
    pub total_count: u64,
}
