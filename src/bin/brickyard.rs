use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use brickyard::date_util::{month_label, parse_sql_timestamp};
use brickyard::{
    Brickyard, CementStock, MaterialReport, NewCementStock, NewProduction, NewSale,
    NewSandPurchase, PeriodWindow, Production, Sale, SandPurchase,
};

#[derive(Parser)]
#[command(name = "brickyard", about = "Stock, production, sales and pay ledger for a brick works")]
struct Cli {
    /// Database path (default: ~/.brickyard/brickyard.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a purchase, production run or sale
    Record {
        #[command(subcommand)]
        entry: RecordEntry,
    },
    /// Replace a recorded entry
    Update {
        #[command(subcommand)]
        entry: UpdateEntry,
    },
    /// Show one recorded entry
    Show {
        #[command(subcommand)]
        target: EntryTarget,
        /// Output as JSON
        #[arg(long, global = true)]
        json: bool,
    },
    /// Delete a recorded entry
    Delete {
        #[command(subcommand)]
        target: EntryTarget,
    },
    /// Aggregate reports over a day, week or month
    Report {
        #[command(subcommand)]
        report: ReportKind,
    },
    /// Weekly pay
    Payroll {
        #[command(subcommand)]
        action: PayrollAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show record counts and the latest pay record
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CementFields {
    /// Cement type, e.g. "Tiga Roda"
    #[arg(long = "type")]
    type_name: String,
    #[arg(long)]
    quantity: i64,
    /// Price per bag
    #[arg(long)]
    price: f64,
    /// Purchase date (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args)]
struct SandFields {
    /// Sand type, e.g. "Putih"
    #[arg(long = "type")]
    type_name: String,
    #[arg(long)]
    quantity: i64,
    /// Price per truck
    #[arg(long)]
    price: f64,
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args)]
struct ProductionFields {
    /// Bricks produced
    #[arg(long)]
    quantity: i64,
    #[arg(long, default_value = "0")]
    cement_used: f64,
    #[arg(long, default_value = "0")]
    sand_used: f64,
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args)]
struct SaleFields {
    #[arg(long)]
    customer: String,
    #[arg(long, default_value = "")]
    address: String,
    /// Bricks sold
    #[arg(long)]
    quantity: i64,
    #[arg(long)]
    date: Option<String>,
}

/// New entries are dated now unless `--date` is given.
#[derive(Subcommand)]
enum RecordEntry {
    /// Cement bags bought
    Cement(CementFields),
    /// Sand truckloads bought
    Sand(SandFields),
    /// A production run
    Production(ProductionFields),
    /// A sale, priced at the configured unit price
    Sale(SaleFields),
}

/// Every field is replaced; the stored date is kept unless `--date` is given.
#[derive(Subcommand)]
enum UpdateEntry {
    Cement {
        id: String,
        #[command(flatten)]
        fields: CementFields,
    },
    Sand {
        id: String,
        #[command(flatten)]
        fields: SandFields,
    },
    Production {
        id: String,
        #[command(flatten)]
        fields: ProductionFields,
    },
    /// Repriced at the configured unit price
    Sale {
        id: String,
        #[command(flatten)]
        fields: SaleFields,
    },
}

#[derive(Subcommand)]
enum EntryTarget {
    /// A cement purchase
    Cement {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// A sand purchase
    Sand {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// A production run
    Production {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// A sale
    Sale {
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Which period a report covers.
#[derive(Args, Clone)]
struct PeriodArgs {
    /// Month of the year (1-12), resolved against the current month
    #[arg(long, conflicts_with = "period")]
    month: Option<u32>,
    /// Period selector: today, wtd, mtd, day:-1, week:-2, month:-3, m7
    #[arg(long)]
    period: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ReportKind {
    /// All summaries for one period
    Dashboard(PeriodArgs),
    /// Cement purchases per type
    Cement(PeriodArgs),
    /// Sand purchases per type
    Sand(PeriodArgs),
    /// Sales transactions
    Sales {
        #[command(flatten)]
        period: PeriodArgs,
        /// Maximum rows listed
        #[arg(long, default_value = "50")]
        limit: u32,
    },
    /// Every sale regardless of period, one page at a time
    Ledger {
        #[arg(long, default_value = "50")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
        #[arg(long)]
        json: bool,
    },
    /// Production runs
    Production(PeriodArgs),
    /// Pay records overlapping a period
    Pay(PeriodArgs),
    /// The pay record whose week covers a day
    WeeklyPay {
        /// Any day in the week (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Individual purchases of one cement type
    CementType {
        name: String,
        #[command(flatten)]
        period: PeriodArgs,
    },
}

#[derive(Subcommand)]
enum PayrollAction {
    /// Compute and store pay for the last completed week now
    Generate {
        /// Treat this instant as the firing time (default: now)
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Run the weekly pay scheduler until interrupted
    Run,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Remove a config value, restoring its default
    Unset { key: String },
    /// List stored values and effective settings
    List,
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn parse_datetime_arg(value: Option<&str>) -> anyhow::Result<NaiveDateTime> {
    match value {
        None => Ok(now()),
        Some(s) => parse_sql_timestamp(s)
            .ok_or_else(|| anyhow::anyhow!("invalid date '{s}', expected YYYY-MM-DD[ HH:MM:SS]")),
    }
}

fn parse_date_arg(value: Option<&str>) -> anyhow::Result<NaiveDate> {
    match value {
        None => Ok(now().date()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("invalid date '{s}', expected YYYY-MM-DD")),
    }
}

fn resolve_window(by: &Brickyard, args: &PeriodArgs) -> anyhow::Result<PeriodWindow> {
    let window = match (&args.month, &args.period) {
        (Some(month), _) => by.window_for_month(*month)?,
        (None, Some(selector)) => by.window_for(selector)?,
        (None, None) => by.window_for("mtd")?,
    };
    log::debug!("Resolved period to {window}");
    Ok(window)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_window_header(title: &str, window: &PeriodWindow) {
    let extra = match window.unit {
        brickyard::PeriodUnit::Month => format!(" ({})", month_label(window.start.month())),
        _ => String::new(),
    };
    println!("{title} {}{extra}", window.label());
    println!("  {} .. {}", window.start, window.end);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut by = Brickyard::open(cli.db.map(PathBuf::from)).await?;

    match cli.command {
        Commands::Record { entry } => handle_record(&by, entry).await?,
        Commands::Update { entry } => handle_update(&by, entry).await?,
        Commands::Show { target, json } => handle_show(&by, target, json).await?,
        Commands::Delete { target } => {
            let id = match target {
                EntryTarget::Cement { id } => {
                    by.delete_cement(&id).await?;
                    id
                }
                EntryTarget::Sand { id } => {
                    by.delete_sand(&id).await?;
                    id
                }
                EntryTarget::Production { id } => {
                    by.delete_production(&id).await?;
                    id
                }
                EntryTarget::Sale { id } => {
                    by.delete_sale(&id).await?;
                    id
                }
            };
            println!("Deleted {id}");
        }
        Commands::Report { report } => handle_report(&by, report).await?,
        Commands::Payroll { action } => handle_payroll(&by, action).await?,
        Commands::Config { action } => handle_config(&mut by, action).await?,
        Commands::Status { json } => print_status(&by, json).await?,
    }

    Ok(())
}

fn cement_input(fields: CementFields, date: NaiveDateTime) -> NewCementStock {
    NewCementStock {
        cement_type_name: fields.type_name,
        quantity: fields.quantity,
        price_per_bag: fields.price,
        purchase_date: date,
    }
}

fn sand_input(fields: SandFields, date: NaiveDateTime) -> NewSandPurchase {
    NewSandPurchase {
        sand_type_name: fields.type_name,
        quantity: fields.quantity,
        price_per_truck: fields.price,
        purchase_date: date,
    }
}

fn production_input(fields: ProductionFields, date: NaiveDateTime) -> NewProduction {
    NewProduction {
        quantity: fields.quantity,
        cement_used: fields.cement_used,
        sand_used: fields.sand_used,
        production_date: date,
    }
}

fn sale_input(fields: SaleFields, date: NaiveDateTime) -> NewSale {
    NewSale {
        customer: fields.customer,
        address: fields.address,
        quantity: fields.quantity,
        purchase_date: date,
    }
}

/// `--date` if given, otherwise `fallback`.
fn date_or(value: Option<&str>, fallback: NaiveDateTime) -> anyhow::Result<NaiveDateTime> {
    match value {
        Some(_) => parse_datetime_arg(value),
        None => Ok(fallback),
    }
}

fn print_cement(verb: &str, stock: &CementStock) {
    println!(
        "{verb} {} bags of {} at {:.2} (total {:.2}) on {} [{}]",
        stock.quantity,
        stock.cement_type.name,
        stock.price_per_bag,
        stock.total_price,
        stock.purchase_date,
        stock.id
    );
}

fn print_sand(verb: &str, purchase: &SandPurchase) {
    println!(
        "{verb} {} trucks of {} sand at {:.2} (total {:.2}) on {} [{}]",
        purchase.quantity,
        purchase.sand_type.name,
        purchase.price_per_truck,
        purchase.total_price,
        purchase.purchase_date,
        purchase.id
    );
}

fn print_production(verb: &str, run: &Production) {
    println!(
        "{verb} production of {} bricks on {} (cement {:.2}, sand {:.2}) [{}]",
        run.quantity, run.production_date, run.cement_used, run.sand_used, run.id
    );
}

fn print_sale(verb: &str, sale: &Sale) {
    println!(
        "{verb} sale of {} bricks to {} for {:.2} on {} [{}]",
        sale.quantity, sale.customer, sale.total_price, sale.purchase_date, sale.id
    );
}

async fn handle_record(by: &Brickyard, entry: RecordEntry) -> anyhow::Result<()> {
    match entry {
        RecordEntry::Cement(fields) => {
            let date = parse_datetime_arg(fields.date.as_deref())?;
            let stock = by.record_cement(cement_input(fields, date)).await?;
            print_cement("Recorded", &stock);
        }
        RecordEntry::Sand(fields) => {
            let date = parse_datetime_arg(fields.date.as_deref())?;
            let purchase = by.record_sand(sand_input(fields, date)).await?;
            print_sand("Recorded", &purchase);
        }
        RecordEntry::Production(fields) => {
            let date = parse_datetime_arg(fields.date.as_deref())?;
            let run = by.record_production(production_input(fields, date)).await?;
            print_production("Recorded", &run);
        }
        RecordEntry::Sale(fields) => {
            let date = parse_datetime_arg(fields.date.as_deref())?;
            let sale = by.record_sale(sale_input(fields, date)).await?;
            print_sale("Recorded", &sale);
        }
    }
    Ok(())
}

async fn handle_update(by: &Brickyard, entry: UpdateEntry) -> anyhow::Result<()> {
    match entry {
        UpdateEntry::Cement { id, fields } => {
            let current = by.cement_stock(&id).await?;
            let date = date_or(fields.date.as_deref(), current.purchase_date)?;
            let stock = by.update_cement(&id, cement_input(fields, date)).await?;
            print_cement("Updated", &stock);
        }
        UpdateEntry::Sand { id, fields } => {
            let current = by.sand_purchase(&id).await?;
            let date = date_or(fields.date.as_deref(), current.purchase_date)?;
            let purchase = by.update_sand(&id, sand_input(fields, date)).await?;
            print_sand("Updated", &purchase);
        }
        UpdateEntry::Production { id, fields } => {
            let current = by.production(&id).await?;
            let date = date_or(fields.date.as_deref(), current.production_date)?;
            let run = by.update_production(&id, production_input(fields, date)).await?;
            print_production("Updated", &run);
        }
        UpdateEntry::Sale { id, fields } => {
            let current = by.sale(&id).await?;
            let date = date_or(fields.date.as_deref(), current.purchase_date)?;
            let sale = by.update_sale(&id, sale_input(fields, date)).await?;
            print_sale("Updated", &sale);
        }
    }
    Ok(())
}

async fn handle_show(by: &Brickyard, target: EntryTarget, json: bool) -> anyhow::Result<()> {
    match target {
        EntryTarget::Cement { id } => {
            let stock = by.cement_stock(&id).await?;
            if json {
                return print_json(&stock);
            }
            print_cement("Bought", &stock);
        }
        EntryTarget::Sand { id } => {
            let purchase = by.sand_purchase(&id).await?;
            if json {
                return print_json(&purchase);
            }
            print_sand("Bought", &purchase);
        }
        EntryTarget::Production { id } => {
            let run = by.production(&id).await?;
            if json {
                return print_json(&run);
            }
            print_production("Ran", &run);
        }
        EntryTarget::Sale { id } => {
            let sale = by.sale(&id).await?;
            if json {
                return print_json(&sale);
            }
            print_sale("Made", &sale);
        }
    }
    Ok(())
}

fn print_material_report(title: &str, unit: &str, report: &MaterialReport) {
    print_window_header(title, &report.window);
    if report.rows.is_empty() {
        println!("  No purchases.");
        return;
    }
    for row in &report.rows {
        println!(
            "  {:<12} {:>6} {unit}  total {:>14.2}  avg {:>12.2}  ({} .. {})",
            row.type_name,
            row.total_quantity,
            row.total_price,
            row.avg_unit_price,
            row.first_purchase.date(),
            row.last_purchase.date()
        );
    }
    println!(
        "  {} type(s), {} {unit}, total {:.2}",
        report.total_count, report.total_quantity, report.total_price
    );
}

async fn handle_report(by: &Brickyard, report: ReportKind) -> anyhow::Result<()> {
    match report {
        ReportKind::Dashboard(args) => {
            let window = resolve_window(by, &args)?;
            let snapshot = by.dashboard(window).await?;
            if args.json {
                return print_json(&snapshot);
            }
            print_window_header("Dashboard", &snapshot.window);
            println!(
                "  Cement:     {} purchases, {} bags, {:.2}",
                snapshot.cement.total_stock,
                snapshot.cement.total_quantity,
                snapshot.cement.total_price
            );
            println!(
                "  Sand:       {} purchases, {} trucks, {:.2}",
                snapshot.sand.total_purchase, snapshot.sand.total_quantity, snapshot.sand.total_price
            );
            println!(
                "  Production: {} bricks",
                snapshot.production.total_production
            );
            println!(
                "  Sales:      {} bricks, income {:.2}",
                snapshot.sales.total_quantity, snapshot.sales.total_income
            );
            println!(
                "  Payroll:    {} week(s), {:.2}",
                snapshot.payroll.total_records, snapshot.payroll.total_pay
            );
        }
        ReportKind::Cement(args) => {
            let window = resolve_window(by, &args)?;
            let report = by.cement_report(window).await?;
            if args.json {
                return print_json(&report);
            }
            print_material_report("Cement", "bags", &report);
        }
        ReportKind::Sand(args) => {
            let window = resolve_window(by, &args)?;
            let report = by.sand_report(window).await?;
            if args.json {
                return print_json(&report);
            }
            print_material_report("Sand", "trucks", &report);
        }
        ReportKind::Sales { period, limit } => {
            let window = resolve_window(by, &period)?;
            let report = by.sales_report(window, limit).await?;
            if period.json {
                return print_json(&report);
            }
            print_window_header("Sales", &report.window);
            for sale in &report.sales {
                println!(
                    "  {}  {:<20} {:>6} bricks  {:>12.2}",
                    sale.purchase_date.date(),
                    sale.customer,
                    sale.quantity,
                    sale.total_price
                );
            }
            if report.total_count > report.sales.len() as u64 {
                println!("  ... {} more", report.total_count - report.sales.len() as u64);
            }
            println!(
                "  {} sale(s), {} bricks, income {:.2}",
                report.total_count, report.summary.total_quantity, report.summary.total_income
            );
        }
        ReportKind::Ledger {
            limit,
            offset,
            json,
        } => {
            let page = by.all_sales(limit, offset).await?;
            if json {
                return print_json(&page);
            }
            println!(
                "Sales {}..{} of {}",
                (page.offset as u64 + 1).min(page.total_count),
                page.offset as u64 + page.sales.len() as u64,
                page.total_count
            );
            for sale in &page.sales {
                println!(
                    "  {}  {:<20} {:>6} bricks  {:>12.2}  [{}]",
                    sale.purchase_date.date(),
                    sale.customer,
                    sale.quantity,
                    sale.total_price,
                    sale.id
                );
            }
        }
        ReportKind::Production(args) => {
            let window = resolve_window(by, &args)?;
            let report = by.production_report(window).await?;
            if args.json {
                return print_json(&report);
            }
            print_window_header("Production", &report.window);
            for run in &report.runs {
                println!(
                    "  {}  {:>6} bricks  cement {:.2}  sand {:.2}",
                    run.production_date, run.quantity, run.cement_used, run.sand_used
                );
            }
            println!("  Total: {} bricks", report.summary.total_production);
        }
        ReportKind::Pay(args) => {
            let window = resolve_window(by, &args)?;
            let report = by.pay_report(window).await?;
            if args.json {
                return print_json(&report);
            }
            print_window_header("Pay", &report.window);
            for r in &report.records {
                println!(
                    "  {} .. {}  {:>6} bricks  {:>12.2}",
                    r.period_start.date(),
                    r.period_end.date(),
                    r.total_production_units,
                    r.computed_pay
                );
            }
            println!("  Total pay: {:.2}", report.total_pay);
        }
        ReportKind::WeeklyPay { date, json } => {
            let date = parse_date_arg(date.as_deref())?;
            let record = by.weekly_pay(date).await?;
            if json {
                return print_json(&record);
            }
            println!(
                "Week {} .. {}: {} bricks, pay {:.2} (recorded {})",
                record.period_start.date(),
                record.period_end.date(),
                record.total_production_units,
                record.computed_pay,
                record.created_at
            );
        }
        ReportKind::CementType { name, period } => {
            let window = resolve_window(by, &period)?;
            let stocks = by.cement_stocks_by_type(&name, window).await?;
            if period.json {
                return print_json(&stocks);
            }
            print_window_header(&format!("Cement '{name}'"), &window);
            if stocks.is_empty() {
                println!("  No purchases.");
            }
            for s in &stocks {
                println!(
                    "  {}  {:>6} bags  {:>10.2}/bag  {:>14.2}",
                    s.purchase_date, s.quantity, s.price_per_bag, s.total_price
                );
            }
        }
    }
    Ok(())
}

async fn handle_payroll(by: &Brickyard, action: PayrollAction) -> anyhow::Result<()> {
    match action {
        PayrollAction::Generate { at, json } => {
            let at = parse_datetime_arg(at.as_deref())?;
            let outcome = by.generate_weekly_pay(at).await?;
            if json {
                return print_json(&outcome);
            }
            let r = outcome.record();
            let verb = if outcome.is_new() {
                "Recorded"
            } else {
                "Already recorded"
            };
            println!(
                "{verb}: week {} .. {}, {} bricks, pay {:.2}",
                r.period_start.date(),
                r.period_end.date(),
                r.total_production_units,
                r.computed_pay
            );
        }
        PayrollAction::Run => {
            let shutdown = CancellationToken::new();
            let handle = by.start_scheduler(&shutdown);
            eprintln!(
                "Pay scheduler running (every {}). Press Ctrl-C to stop.",
                by.settings().pay_trigger
            );
            tokio::signal::ctrl_c().await?;
            eprintln!("Stopping...");
            handle.shutdown().await?;
        }
    }
    Ok(())
}

async fn handle_config(by: &mut Brickyard, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match by.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            by.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::Unset { key } => {
            if by.config_unset(&key).await? {
                println!("Removed: {key}");
            } else {
                println!("{key} is not set");
            }
        }
        ConfigAction::List => {
            let stored = by.config_list().await?;
            if stored.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in stored {
                    println!("{k} = {v}");
                }
            }
            println!();
            println!("Effective settings:");
            for (k, v) in by.settings().entries() {
                println!("  {k} = {v}");
            }
        }
    }
    Ok(())
}

async fn print_status(by: &Brickyard, json: bool) -> anyhow::Result<()> {
    let status = by.status().await?;
    if json {
        return print_json(&status);
    }
    println!("brickyard status:");
    println!("  Cement purchases: {}", status.cement_stocks);
    println!("  Sand purchases:   {}", status.sand_purchases);
    println!("  Production runs:  {}", status.productions);
    println!("  Sales:            {}", status.sales);
    println!("  Pay records:      {}", status.pay_records);
    println!(
        "  Latest pay:       {}",
        status
            .latest_pay
            .map(|r| format!(
                "{} .. {} ({:.2})",
                r.period_start.date(),
                r.period_end.date(),
                r.computed_pay
            ))
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Pay trigger:      {}", by.settings().pay_trigger);
    Ok(())
}
