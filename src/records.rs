use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{Error, Result};

/// A named cement brand or sand grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialType {
    pub id: i64,
    pub name: String,
}

/// A cement purchase as entered. The id, total and timestamps come back
/// from the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewCementStock {
    pub cement_type_name: String,
    pub quantity: i64,
    pub price_per_bag: f64,
    pub purchase_date: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CementStock {
    pub id: String,
    pub cement_type: MaterialType,
    pub quantity: i64,
    pub price_per_bag: f64,
    pub total_price: f64,
    pub purchase_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSandPurchase {
    pub sand_type_name: String,
    pub quantity: i64,
    pub price_per_truck: f64,
    pub purchase_date: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SandPurchase {
    pub id: String,
    pub sand_type: MaterialType,
    pub quantity: i64,
    pub price_per_truck: f64,
    pub total_price: f64,
    pub purchase_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProduction {
    pub quantity: i64,
    pub cement_used: f64,
    pub sand_used: f64,
    pub production_date: NaiveDateTime,
}

/// One production run: bricks made and materials consumed.
#[derive(Debug, Clone, Serialize)]
pub struct Production {
    pub id: String,
    pub quantity: i64,
    pub cement_used: f64,
    pub sand_used: f64,
    pub production_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSale {
    pub customer: String,
    pub address: String,
    pub quantity: i64,
    pub purchase_date: NaiveDateTime,
}

/// A sales transaction. `total_price` is fixed at insert time from the
/// configured unit price.
#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: String,
    pub customer: String,
    pub address: String,
    pub quantity: i64,
    pub total_price: f64,
    pub purchase_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Pay computed for one completed work week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodPayRecord {
    pub id: String,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub total_production_units: i64,
    pub computed_pay: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One page of the full sales ledger, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct SalesPage {
    pub sales: Vec<Sale>,
    /// Number of sales across all pages.
    pub total_count: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Row counts and the most recent pay record.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub cement_stocks: u64,
    pub sand_purchases: u64,
    pub productions: u64,
    pub sales: u64,
    pub pay_records: u64,
    pub latest_pay: Option<PeriodPayRecord>,
}

fn require_positive_quantity(quantity: i64) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::Validation(format!(
            "quantity must be greater than 0, got {quantity}"
        )));
    }
    Ok(())
}

fn require_positive_price(field: &str, price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::Validation(format!(
            "{field} must be greater than 0, got {price}"
        )));
    }
    Ok(())
}

fn require_not_future(field: &str, date: NaiveDateTime, now: NaiveDateTime) -> Result<()> {
    if date > now {
        return Err(Error::Validation(format!("{field} cannot be in the future")));
    }
    Ok(())
}

impl NewCementStock {
    pub fn validate(&self, now: NaiveDateTime) -> Result<()> {
        if self.cement_type_name.trim().is_empty() {
            return Err(Error::Validation("cement type name is required".into()));
        }
        require_positive_quantity(self.quantity)?;
        require_positive_price("price_per_bag", self.price_per_bag)?;
        require_not_future("purchase_date", self.purchase_date, now)
    }
}

impl NewSandPurchase {
    pub fn validate(&self, now: NaiveDateTime) -> Result<()> {
        if self.sand_type_name.trim().is_empty() {
            return Err(Error::Validation("sand type name is required".into()));
        }
        require_positive_quantity(self.quantity)?;
        require_positive_price("price_per_truck", self.price_per_truck)?;
        require_not_future("purchase_date", self.purchase_date, now)
    }
}

impl NewProduction {
    pub fn validate(&self, now: NaiveDateTime) -> Result<()> {
        require_positive_quantity(self.quantity)?;
        if self.cement_used < 0.0 || self.sand_used < 0.0 {
            return Err(Error::Validation(
                "material usage cannot be negative".into(),
            ));
        }
        require_not_future("production_date", self.production_date, now)
    }
}

impl NewSale {
    pub fn validate(&self, now: NaiveDateTime) -> Result<()> {
        if self.customer.trim().is_empty() {
            return Err(Error::Validation("customer is required".into()));
        }
        require_positive_quantity(self.quantity)?;
        require_not_future("purchase_date", self.purchase_date, now)
    }
}
