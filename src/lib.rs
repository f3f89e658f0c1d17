pub mod aggregate;
pub mod config;
pub mod date_util;
pub mod error;
pub mod payroll;
pub mod query;
pub mod records;
pub mod storage;

pub use aggregate::{
    build_snapshot, AggregateReader, AggregateSnapshot, MaterialReport, MaterialTypeTotal,
    PayReport, ProductionReport, SalesReport,
};
pub use config::Settings;
pub use error::{Error, Result};
pub use payroll::{FiringOutcome, PayrollJob, SchedulerHandle, WeeklyTrigger};
pub use query::period::{compute_window, PeriodUnit, PeriodWindow};
pub use query::selector::PeriodSelector;
pub use records::{
    CementStock, NewCementStock, NewProduction, NewSale, NewSandPurchase, PeriodPayRecord,
    Production, Sale, SalesPage, SandPurchase, StoreStatus,
};
pub use storage::Database;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio_util::sync::CancellationToken;

use payroll::LocalClock;
use storage::repository;

/// Entry point for recording and reporting on the brick works.
pub struct Brickyard {
    db: Database,
    settings: Settings,
}

impl Brickyard {
    /// Open the store at `path` (or the default location) and load settings.
    ///
    /// The store is reopened if the configured reader pool size differs
    /// from the default.
    pub async fn open(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => Database::default_path()?,
        };
        let db = Database::open_at(&path).await?;
        let settings = Settings::load(&db).await?;

        let db = if settings.reader_pool_size != db.reader_count() {
            drop(db);
            Database::open_with_pool(&path, settings.reader_pool_size).await?
        } else {
            db
        };
        log::debug!("Opened {} with {:?}", path.display(), settings);

        Ok(Self {
            db: db.with_timeout(settings.query_timeout),
            settings,
        })
    }

    /// Wrap an already open store (used with in-memory databases).
    pub async fn from_database(db: Database) -> Result<Self> {
        let settings = Settings::load(&db).await?;
        Ok(Self {
            db: db.with_timeout(settings.query_timeout),
            settings,
        })
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    // ── Recording ──────────────────────────────────────────────────

    pub async fn record_cement(&self, new: NewCementStock) -> Result<CementStock> {
        new.validate(Self::now())?;
        self.db
            .write(move |conn| repository::insert_cement_stock(conn, &new))
            .await
    }

    pub async fn record_sand(&self, new: NewSandPurchase) -> Result<SandPurchase> {
        new.validate(Self::now())?;
        self.db
            .write(move |conn| repository::insert_sand_purchase(conn, &new))
            .await
    }

    pub async fn record_production(&self, new: NewProduction) -> Result<Production> {
        new.validate(Self::now())?;
        self.db
            .write(move |conn| repository::insert_production(conn, &new))
            .await
    }

    /// Record a sale priced at the configured unit price.
    pub async fn record_sale(&self, new: NewSale) -> Result<Sale> {
        new.validate(Self::now())?;
        let unit_price = self.settings.sale_unit_price;
        self.db
            .write(move |conn| repository::insert_sale(conn, &new, unit_price))
            .await
    }

    // ── Editing ────────────────────────────────────────────────────
    //
    // Edits change what later reports see. Pay already stored for a week
    // is not recomputed.

    pub async fn cement_stock(&self, id: &str) -> Result<CementStock> {
        let id = id.to_string();
        self.db
            .read(move |conn| repository::get_cement_stock(conn, &id))
            .await
    }

    pub async fn update_cement(&self, id: &str, new: NewCementStock) -> Result<CementStock> {
        new.validate(Self::now())?;
        let id = id.to_string();
        self.db
            .write(move |conn| repository::update_cement_stock(conn, &id, &new))
            .await
    }

    pub async fn delete_cement(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .write(move |conn| repository::delete_cement_stock(conn, &id))
            .await
    }

    pub async fn sand_purchase(&self, id: &str) -> Result<SandPurchase> {
        let id = id.to_string();
        self.db
            .read(move |conn| repository::get_sand_purchase(conn, &id))
            .await
    }

    pub async fn update_sand(&self, id: &str, new: NewSandPurchase) -> Result<SandPurchase> {
        new.validate(Self::now())?;
        let id = id.to_string();
        self.db
            .write(move |conn| repository::update_sand_purchase(conn, &id, &new))
            .await
    }

    pub async fn delete_sand(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .write(move |conn| repository::delete_sand_purchase(conn, &id))
            .await
    }

    pub async fn production(&self, id: &str) -> Result<Production> {
        let id = id.to_string();
        self.db
            .read(move |conn| repository::get_production(conn, &id))
            .await
    }

    pub async fn update_production(&self, id: &str, new: NewProduction) -> Result<Production> {
        new.validate(Self::now())?;
        let id = id.to_string();
        self.db
            .write(move |conn| repository::update_production(conn, &id, &new))
            .await
    }

    pub async fn delete_production(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .write(move |conn| repository::delete_production(conn, &id))
            .await
    }

    pub async fn sale(&self, id: &str) -> Result<Sale> {
        let id = id.to_string();
        self.db.read(move |conn| repository::get_sale(conn, &id)).await
    }

    /// Replace a sale, repriced at the configured unit price.
    pub async fn update_sale(&self, id: &str, new: NewSale) -> Result<Sale> {
        new.validate(Self::now())?;
        let id = id.to_string();
        let unit_price = self.settings.sale_unit_price;
        self.db
            .write(move |conn| repository::update_sale(conn, &id, &new, unit_price))
            .await
    }

    pub async fn delete_sale(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .write(move |conn| repository::delete_sale(conn, &id))
            .await
    }

    // ── Reports ────────────────────────────────────────────────────

    /// Resolve a selector string (`mtd`, `week:-1`, `m7`, ...) against now.
    pub fn window_for(&self, selector: &str) -> Result<PeriodWindow> {
        let now = Self::now();
        Ok(PeriodSelector::parse(selector, now)?.window(now))
    }

    /// Resolve a month-of-year number against the current month.
    pub fn window_for_month(&self, month: u32) -> Result<PeriodWindow> {
        let now = Self::now();
        Ok(PeriodSelector::from_month_number(month, now)?.window(now))
    }

    /// All five summaries for `window`, computed concurrently.
    pub async fn dashboard(&self, window: PeriodWindow) -> Result<AggregateSnapshot> {
        build_snapshot(Arc::new(self.db.clone()), window).await
    }

    pub async fn cement_report(&self, window: PeriodWindow) -> Result<MaterialReport> {
        aggregate::cement_report(&self.db, window).await
    }

    pub async fn sand_report(&self, window: PeriodWindow) -> Result<MaterialReport> {
        aggregate::sand_report(&self.db, window).await
    }

    /// Individual purchases of one cement type.
    pub async fn cement_stocks_by_type(
        &self,
        type_name: &str,
        window: PeriodWindow,
    ) -> Result<Vec<CementStock>> {
        let type_name = type_name.to_string();
        self.db
            .read(move |conn| repository::list_cement_stocks_by_type(conn, &type_name, &window))
            .await
    }

    pub async fn production_report(&self, window: PeriodWindow) -> Result<ProductionReport> {
        let summary = self.db.production_summary(window).await?;
        let runs = self
            .db
            .read(move |conn| Ok(repository::list_productions(conn, &window)?))
            .await?;
        Ok(ProductionReport {
            window,
            summary,
            runs,
        })
    }

    pub async fn sales_report(&self, window: PeriodWindow, limit: u32) -> Result<SalesReport> {
        let summary = self.db.sales_summary(window).await?;
        let (sales, total_count) = self
            .db
            .read(move |conn| Ok(repository::list_sales(conn, &window, limit)?))
            .await?;
        Ok(SalesReport {
            window,
            summary,
            sales,
            total_count,
        })
    }

    /// Every sale regardless of period, one page at a time.
    pub async fn all_sales(&self, limit: u32, offset: u32) -> Result<SalesPage> {
        let (sales, total_count) = self
            .db
            .read(move |conn| Ok(repository::list_all_sales(conn, limit, offset)?))
            .await?;
        Ok(SalesPage {
            sales,
            total_count,
            limit,
            offset,
        })
    }

    pub async fn pay_report(&self, window: PeriodWindow) -> Result<PayReport> {
        aggregate::pay_report(&self.db, window).await
    }

    /// The stored pay record whose week covers `date`.
    pub async fn weekly_pay(&self, date: NaiveDate) -> Result<PeriodPayRecord> {
        let instant = date.and_time(NaiveTime::MIN);
        self.db
            .read(move |conn| Ok(repository::find_pay_record_covering(conn, &instant)?))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Pay record covering {date}")))
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        self.db
            .read(|conn| Ok(repository::store_status(conn)?))
            .await
    }

    // ── Payroll ────────────────────────────────────────────────────

    pub fn payroll_job(&self) -> PayrollJob {
        PayrollJob::new(self.db.clone(), self.settings.pay_rate)
    }

    /// Compute pay outside the schedule for the last week that had ended
    /// by `at`.
    pub async fn generate_weekly_pay(&self, at: NaiveDateTime) -> Result<FiringOutcome> {
        self.payroll_job().fire_for(at).await
    }

    /// Start the weekly pay scheduler on the configured trigger.
    pub fn start_scheduler(&self, shutdown: &CancellationToken) -> SchedulerHandle {
        payroll::start_scheduler(
            Arc::new(self.payroll_job()),
            LocalClock,
            self.settings.pay_trigger,
            shutdown,
        )
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.db
            .read(move |conn| Ok(repository::get_config(conn, &key)?))
            .await
    }

    /// Validate and store a setting, then reload settings.
    pub async fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        Settings::check_entry(key, value)?;
        let key = key.to_string();
        let value = value.trim().to_string();
        self.db
            .write(move |conn| Ok(repository::set_config(conn, &key, &value)?))
            .await?;
        self.reload_settings().await
    }

    /// Remove a setting so its default applies again.
    pub async fn config_unset(&mut self, key: &str) -> Result<bool> {
        let key = key.to_string();
        let removed = self
            .db
            .write(move |conn| Ok(repository::unset_config(conn, &key)?))
            .await?;
        self.reload_settings().await?;
        Ok(removed)
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .read(|conn| Ok(repository::list_config(conn)?))
            .await
    }

    async fn reload_settings(&mut self) -> Result<()> {
        self.settings = Settings::load(&self.db).await?;
        self.db = self.db.clone().with_timeout(self.settings.query_timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn brickyard() -> Brickyard {
        Brickyard::from_database(Database::open_memory().await.unwrap())
            .await
            .unwrap()
    }

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_and_dashboard() {
        let by = brickyard().await;
        by.record_cement(NewCementStock {
            cement_type_name: "Tiga Roda".into(),
            quantity: 40,
            price_per_bag: 60_000.0,
            purchase_date: at(3, 4, 8),
        })
        .await
        .unwrap();
        by.record_production(NewProduction {
            quantity: 120,
            cement_used: 4.0,
            sand_used: 0.5,
            production_date: at(3, 12, 14),
        })
        .await
        .unwrap();
        let sale = by
            .record_sale(NewSale {
                customer: "Bu Sri".into(),
                address: "Desa Sukamaju".into(),
                quantity: 50,
                purchase_date: at(3, 13, 11),
            })
            .await
            .unwrap();
        assert_eq!(sale.total_price, 80_000.0);

        let snapshot = by.dashboard(PeriodWindow::month(2024, 3)).await.unwrap();
        assert_eq!(snapshot.cement.total_quantity, 40);
        assert_eq!(snapshot.cement.total_price, 2_400_000.0);
        assert_eq!(snapshot.production.total_production, 120);
        assert_eq!(snapshot.sales.total_income, 80_000.0);
        assert_eq!(snapshot.payroll.total_pay, 0.0);
    }

    #[tokio::test]
    async fn test_validation_happens_before_store() {
        let by = brickyard().await;
        let err = by
            .record_production(NewProduction {
                quantity: 0,
                cement_used: 0.0,
                sand_used: 0.0,
                production_date: at(3, 12, 14),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(by.status().await.unwrap().productions, 0);
    }

    #[tokio::test]
    async fn test_unknown_cement_type_is_not_found() {
        let by = brickyard().await;
        let err = by
            .record_cement(NewCementStock {
                cement_type_name: "Holcim".into(),
                quantity: 1,
                price_per_bag: 1.0,
                purchase_date: at(3, 4, 8),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_io());
    }

    #[tokio::test]
    async fn test_weekly_pay_generation_and_lookup() {
        let by = brickyard().await;
        by.record_production(NewProduction {
            quantity: 120,
            cement_used: 4.0,
            sand_used: 0.5,
            production_date: at(3, 12, 14),
        })
        .await
        .unwrap();

        let friday = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(matches!(
            by.weekly_pay(friday).await,
            Err(Error::NotFound(_))
        ));

        // Generated the Monday after, it covers the week of the 11th
        let outcome = by.generate_weekly_pay(at(3, 18, 8)).await.unwrap();
        assert_eq!(outcome.record().computed_pay, 54_000.0);

        let stored = by.weekly_pay(friday).await.unwrap();
        assert_eq!(&stored, outcome.record());
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(by.weekly_pay(sunday).await.unwrap().id, stored.id);

        let again = by.generate_weekly_pay(at(3, 19, 8)).await.unwrap();
        assert!(!again.is_new());

        let status = by.status().await.unwrap();
        assert_eq!(status.pay_records, 1);
        assert_eq!(status.latest_pay.unwrap().id, stored.id);
    }

    #[tokio::test]
    async fn test_edits_change_reports() {
        let by = brickyard().await;
        let run = by
            .record_production(NewProduction {
                quantity: 100,
                cement_used: 3.0,
                sand_used: 0.5,
                production_date: at(3, 12, 14),
            })
            .await
            .unwrap();
        let sale = by
            .record_sale(NewSale {
                customer: "Bu Sri".into(),
                address: String::new(),
                quantity: 50,
                purchase_date: at(3, 13, 11),
            })
            .await
            .unwrap();

        by.update_production(
            &run.id,
            NewProduction {
                quantity: 140,
                cement_used: 3.0,
                sand_used: 0.5,
                production_date: at(3, 12, 14),
            },
        )
        .await
        .unwrap();
        by.delete_sale(&sale.id).await.unwrap();

        let march = PeriodWindow::month(2024, 3);
        let snapshot = by.dashboard(march).await.unwrap();
        assert_eq!(snapshot.production.total_production, 140);
        assert_eq!(snapshot.sales.total_quantity, 0);
        assert!(matches!(by.sale(&sale.id).await, Err(Error::NotFound(_))));

        // Input is validated before the store is touched
        let err = by
            .update_production(
                &run.id,
                NewProduction {
                    quantity: 0,
                    cement_used: 0.0,
                    sand_used: 0.0,
                    production_date: at(3, 12, 14),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(by.production(&run.id).await.unwrap().quantity, 140);
    }

    #[tokio::test]
    async fn test_update_sale_uses_configured_price() {
        let mut by = brickyard().await;
        let sale = by
            .record_sale(NewSale {
                customer: "Pak Joko".into(),
                address: String::new(),
                quantity: 10,
                purchase_date: at(3, 13, 11),
            })
            .await
            .unwrap();
        assert_eq!(sale.total_price, 16_000.0);

        by.config_set(config::KEY_SALE_UNIT_PRICE, "1800").await.unwrap();
        let updated = by
            .update_sale(
                &sale.id,
                NewSale {
                    customer: "Pak Joko".into(),
                    address: "Jl. Kenanga".into(),
                    quantity: 10,
                    purchase_date: at(3, 13, 11),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_price, 18_000.0);

        let page = by.all_sales(10, 0).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.sales[0].address, "Jl. Kenanga");
    }

    #[tokio::test]
    async fn test_config_set_reloads_settings() {
        let mut by = brickyard().await;
        by.config_set(config::KEY_SALE_UNIT_PRICE, "2000").await.unwrap();
        by.config_set(config::KEY_QUERY_TIMEOUT_MS, "1500").await.unwrap();
        assert_eq!(by.settings().sale_unit_price, 2000.0);
        assert_eq!(by.db().timeout(), Duration::from_millis(1500));

        let sale = by
            .record_sale(NewSale {
                customer: "Pak Joko".into(),
                address: String::new(),
                quantity: 10,
                purchase_date: at(3, 13, 11),
            })
            .await
            .unwrap();
        assert_eq!(sale.total_price, 20_000.0);

        assert!(by.config_set(config::KEY_PAY_RATE, "zero").await.is_err());
        assert!(by.config_unset(config::KEY_SALE_UNIT_PRICE).await.unwrap());
        assert_eq!(by.settings().sale_unit_price, config::DEFAULT_SALE_UNIT_PRICE);
        assert_eq!(by.config_get(config::KEY_SALE_UNIT_PRICE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_reopens_with_configured_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yard.db");

        let mut by = Brickyard::open(Some(path.clone())).await.unwrap();
        assert_eq!(by.db().reader_count(), storage::DEFAULT_READER_POOL);
        by.config_set(config::KEY_READER_POOL_SIZE, "2").await.unwrap();
        drop(by);

        let by = Brickyard::open(Some(path)).await.unwrap();
        assert_eq!(by.db().reader_count(), 2);
    }

    #[tokio::test]
    async fn test_scheduler_starts_and_stops() {
        let by = brickyard().await;
        let shutdown = CancellationToken::new();
        let handle = by.start_scheduler(&shutdown);
        shutdown.cancel();
        handle.wait().await.unwrap();
    }
}
