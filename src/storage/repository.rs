use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::{parse_sql_timestamp, to_sql_timestamp};
use crate::error::{Error, Result};
use crate::query::period::PeriodWindow;
use crate::records::{
    CementStock, MaterialType, NewCementStock, NewProduction, NewSale, NewSandPurchase,
    PeriodPayRecord, Production, Sale, SandPurchase, StoreStatus,
};

/// Outcome of an insert that is allowed to happen at most once per key.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOnce<T> {
    Inserted(T),
    Existing(T),
}

// ── Material types ─────────────────────────────────────────────────

pub fn find_cement_type(conn: &Connection, name: &str) -> rusqlite::Result<Option<MaterialType>> {
    conn.query_row(
        "SELECT id, name FROM cement_types WHERE name = ?1",
        params![name],
        |row| Ok(MaterialType { id: row.get(0)?, name: row.get(1)? }),
    )
    .optional()
}

pub fn find_sand_type(conn: &Connection, name: &str) -> rusqlite::Result<Option<MaterialType>> {
    conn.query_row(
        "SELECT id, name FROM sand_types WHERE name = ?1",
        params![name],
        |row| Ok(MaterialType { id: row.get(0)?, name: row.get(1)? }),
    )
    .optional()
}

// ── Cement stock ───────────────────────────────────────────────────

/// Look up the cement type and insert the purchase in one transaction.
pub fn insert_cement_stock(conn: &mut Connection, new: &NewCementStock) -> Result<CementStock> {
    let tx = conn.transaction()?;

    let cement_type = find_cement_type(&tx, &new.cement_type_name)?
        .ok_or_else(|| Error::NotFound(format!("Cement type '{}'", new.cement_type_name)))?;

    let id = uuid::Uuid::new_v4().to_string();
    let (created_at, updated_at) = tx
        .query_row(
            "INSERT INTO cement_stocks (id, cement_type_id, quantity, price_per_bag, purchase_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING created_at, updated_at",
            params![
                id,
                cement_type.id,
                new.quantity,
                new.price_per_bag,
                to_sql_timestamp(&new.purchase_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .map_err(|e| constraint_error(e, "Cement stock"))?;

    tx.commit()?;

    Ok(CementStock {
        id,
        cement_type,
        quantity: new.quantity,
        price_per_bag: new.price_per_bag,
        total_price: new.quantity as f64 * new.price_per_bag,
        purchase_date: new.purchase_date,
        created_at,
        updated_at,
    })
}

/// Replace every field of an existing cement purchase. The type is looked
/// up again inside the same transaction.
pub fn update_cement_stock(
    conn: &mut Connection,
    id: &str,
    new: &NewCementStock,
) -> Result<CementStock> {
    let tx = conn.transaction()?;

    let cement_type = find_cement_type(&tx, &new.cement_type_name)?
        .ok_or_else(|| Error::NotFound(format!("Cement type '{}'", new.cement_type_name)))?;

    let stamps = tx
        .query_row(
            &format!(
                "UPDATE cement_stocks
                 SET cement_type_id = ?2, quantity = ?3, price_per_bag = ?4, purchase_date = ?5,
                     updated_at = {NOW_SQL}
                 WHERE id = ?1
                 RETURNING created_at, updated_at"
            ),
            params![
                id,
                cement_type.id,
                new.quantity,
                new.price_per_bag,
                to_sql_timestamp(&new.purchase_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .optional()
        .map_err(|e| constraint_error(e, "Cement stock"))?;
    let (created_at, updated_at) =
        stamps.ok_or_else(|| Error::NotFound(format!("Cement stock '{id}'")))?;

    tx.commit()?;

    Ok(CementStock {
        id: id.to_string(),
        cement_type,
        quantity: new.quantity,
        price_per_bag: new.price_per_bag,
        total_price: new.quantity as f64 * new.price_per_bag,
        purchase_date: new.purchase_date,
        created_at,
        updated_at,
    })
}

const CEMENT_STOCK_SELECT: &str = "SELECT cs.id, ct.id, ct.name, cs.quantity, cs.price_per_bag,
        cs.purchase_date, cs.created_at, cs.updated_at
     FROM cement_stocks cs
     JOIN cement_types ct ON cs.cement_type_id = ct.id";

fn cement_stock_from_row(row: &Row<'_>) -> rusqlite::Result<CementStock> {
    let quantity: i64 = row.get(3)?;
    let price_per_bag: f64 = row.get(4)?;
    Ok(CementStock {
        id: row.get(0)?,
        cement_type: MaterialType { id: row.get(1)?, name: row.get(2)? },
        quantity,
        price_per_bag,
        total_price: quantity as f64 * price_per_bag,
        purchase_date: timestamp_at(row, 5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}

pub fn get_cement_stock(conn: &Connection, id: &str) -> Result<CementStock> {
    conn.query_row(
        &format!("{CEMENT_STOCK_SELECT} WHERE cs.id = ?1"),
        params![id],
        cement_stock_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Cement stock '{id}'")))
}

pub fn delete_cement_stock(conn: &Connection, id: &str) -> Result<()> {
    delete_by_id(conn, "cement_stocks", "Cement stock", id)
}

/// Individual cement purchases of one type inside `window`, newest first.
pub fn list_cement_stocks_by_type(
    conn: &Connection,
    type_name: &str,
    window: &PeriodWindow,
) -> Result<Vec<CementStock>> {
    if find_cement_type(conn, type_name)?.is_none() {
        return Err(Error::NotFound(format!("Cement type '{type_name}'")));
    }

    let mut stmt = conn.prepare(&format!(
        "{CEMENT_STOCK_SELECT}
         WHERE ct.name = ?1 AND cs.purchase_date BETWEEN ?2 AND ?3
         ORDER BY cs.purchase_date DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            type_name,
            to_sql_timestamp(&window.start),
            to_sql_timestamp(&window.end)
        ],
        cement_stock_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ── Sand purchases ─────────────────────────────────────────────────

/// Look up the sand type and insert the purchase in one transaction.
pub fn insert_sand_purchase(conn: &mut Connection, new: &NewSandPurchase) -> Result<SandPurchase> {
    let tx = conn.transaction()?;

    let sand_type = find_sand_type(&tx, &new.sand_type_name)?
        .ok_or_else(|| Error::NotFound(format!("Sand type '{}'", new.sand_type_name)))?;

    let id = uuid::Uuid::new_v4().to_string();
    let (created_at, updated_at) = tx
        .query_row(
            "INSERT INTO sand_purchases (id, sand_type_id, quantity, price_per_truck, purchase_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING created_at, updated_at",
            params![
                id,
                sand_type.id,
                new.quantity,
                new.price_per_truck,
                to_sql_timestamp(&new.purchase_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .map_err(|e| constraint_error(e, "Sand purchase"))?;

    tx.commit()?;

    Ok(SandPurchase {
        id,
        sand_type,
        quantity: new.quantity,
        price_per_truck: new.price_per_truck,
        total_price: new.quantity as f64 * new.price_per_truck,
        purchase_date: new.purchase_date,
        created_at,
        updated_at,
    })
}

/// Replace every field of an existing sand purchase. The type is looked up
/// again inside the same transaction.
pub fn update_sand_purchase(
    conn: &mut Connection,
    id: &str,
    new: &NewSandPurchase,
) -> Result<SandPurchase> {
    let tx = conn.transaction()?;

    let sand_type = find_sand_type(&tx, &new.sand_type_name)?
        .ok_or_else(|| Error::NotFound(format!("Sand type '{}'", new.sand_type_name)))?;

    let stamps = tx
        .query_row(
            &format!(
                "UPDATE sand_purchases
                 SET sand_type_id = ?2, quantity = ?3, price_per_truck = ?4, purchase_date = ?5,
                     updated_at = {NOW_SQL}
                 WHERE id = ?1
                 RETURNING created_at, updated_at"
            ),
            params![
                id,
                sand_type.id,
                new.quantity,
                new.price_per_truck,
                to_sql_timestamp(&new.purchase_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .optional()
        .map_err(|e| constraint_error(e, "Sand purchase"))?;
    let (created_at, updated_at) =
        stamps.ok_or_else(|| Error::NotFound(format!("Sand purchase '{id}'")))?;

    tx.commit()?;

    Ok(SandPurchase {
        id: id.to_string(),
        sand_type,
        quantity: new.quantity,
        price_per_truck: new.price_per_truck,
        total_price: new.quantity as f64 * new.price_per_truck,
        purchase_date: new.purchase_date,
        created_at,
        updated_at,
    })
}

pub fn get_sand_purchase(conn: &Connection, id: &str) -> Result<SandPurchase> {
    conn.query_row(
        "SELECT sp.id, st.id, st.name, sp.quantity, sp.price_per_truck,
                sp.purchase_date, sp.created_at, sp.updated_at
         FROM sand_purchases sp
         JOIN sand_types st ON sp.sand_type_id = st.id
         WHERE sp.id = ?1",
        params![id],
        |row| {
            let quantity: i64 = row.get(3)?;
            let price_per_truck: f64 = row.get(4)?;
            Ok(SandPurchase {
                id: row.get(0)?,
                sand_type: MaterialType { id: row.get(1)?, name: row.get(2)? },
                quantity,
                price_per_truck,
                total_price: quantity as f64 * price_per_truck,
                purchase_date: timestamp_at(row, 5)?,
                created_at: timestamp_at(row, 6)?,
                updated_at: timestamp_at(row, 7)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Sand purchase '{id}'")))
}

pub fn delete_sand_purchase(conn: &Connection, id: &str) -> Result<()> {
    delete_by_id(conn, "sand_purchases", "Sand purchase", id)
}

// ── Production ─────────────────────────────────────────────────────

pub fn insert_production(conn: &Connection, new: &NewProduction) -> Result<Production> {
    let id = uuid::Uuid::new_v4().to_string();
    let (created_at, updated_at) = conn
        .query_row(
            "INSERT INTO productions (id, quantity, cement_used, sand_used, production_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING created_at, updated_at",
            params![
                id,
                new.quantity,
                new.cement_used,
                new.sand_used,
                to_sql_timestamp(&new.production_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .map_err(|e| constraint_error(e, "Production"))?;

    Ok(Production {
        id,
        quantity: new.quantity,
        cement_used: new.cement_used,
        sand_used: new.sand_used,
        production_date: new.production_date,
        created_at,
        updated_at,
    })
}

pub fn update_production(conn: &Connection, id: &str, new: &NewProduction) -> Result<Production> {
    conn.query_row(
        &format!(
            "UPDATE productions
             SET quantity = ?2, cement_used = ?3, sand_used = ?4, production_date = ?5,
                 updated_at = {NOW_SQL}
             WHERE id = ?1
             RETURNING {PRODUCTION_COLUMNS}"
        ),
        params![
            id,
            new.quantity,
            new.cement_used,
            new.sand_used,
            to_sql_timestamp(&new.production_date),
        ],
        production_from_row,
    )
    .optional()
    .map_err(|e| constraint_error(e, "Production"))?
    .ok_or_else(|| Error::NotFound(format!("Production '{id}'")))
}

pub fn get_production(conn: &Connection, id: &str) -> Result<Production> {
    conn.query_row(
        &format!("SELECT {PRODUCTION_COLUMNS} FROM productions WHERE id = ?1"),
        params![id],
        production_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Production '{id}'")))
}

pub fn delete_production(conn: &Connection, id: &str) -> Result<()> {
    delete_by_id(conn, "productions", "Production", id)
}

pub fn list_productions(conn: &Connection, window: &PeriodWindow) -> rusqlite::Result<Vec<Production>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCTION_COLUMNS}
         FROM productions
         WHERE production_date BETWEEN ?1 AND ?2
         ORDER BY production_date DESC"
    ))?;
    let rows = stmt.query_map(
        params![to_sql_timestamp(&window.start), to_sql_timestamp(&window.end)],
        production_from_row,
    )?;
    rows.collect()
}

const PRODUCTION_COLUMNS: &str =
    "id, quantity, cement_used, sand_used, production_date, created_at, updated_at";

fn production_from_row(row: &Row<'_>) -> rusqlite::Result<Production> {
    Ok(Production {
        id: row.get(0)?,
        quantity: row.get(1)?,
        cement_used: row.get(2)?,
        sand_used: row.get(3)?,
        production_date: timestamp_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

// ── Sales ──────────────────────────────────────────────────────────

/// Insert a sale priced at `unit_price` per brick.
pub fn insert_sale(conn: &Connection, new: &NewSale, unit_price: f64) -> Result<Sale> {
    let id = uuid::Uuid::new_v4().to_string();
    let total_price = new.quantity as f64 * unit_price;
    let (created_at, updated_at) = conn
        .query_row(
            "INSERT INTO transactions (id, customer, address, quantity, total_price, purchase_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING created_at, updated_at",
            params![
                id,
                new.customer,
                new.address,
                new.quantity,
                total_price,
                to_sql_timestamp(&new.purchase_date),
            ],
            |row| Ok((timestamp_at(row, 0)?, timestamp_at(row, 1)?)),
        )
        .map_err(|e| constraint_error(e, "Sale"))?;

    Ok(Sale {
        id,
        customer: new.customer.clone(),
        address: new.address.clone(),
        quantity: new.quantity,
        total_price,
        purchase_date: new.purchase_date,
        created_at,
        updated_at,
    })
}

/// Replace an existing sale, repricing it at `unit_price` per brick.
pub fn update_sale(conn: &Connection, id: &str, new: &NewSale, unit_price: f64) -> Result<Sale> {
    conn.query_row(
        &format!(
            "UPDATE transactions
             SET customer = ?2, address = ?3, quantity = ?4, total_price = ?5, purchase_date = ?6,
                 updated_at = {NOW_SQL}
             WHERE id = ?1
             RETURNING {SALE_COLUMNS}"
        ),
        params![
            id,
            new.customer,
            new.address,
            new.quantity,
            new.quantity as f64 * unit_price,
            to_sql_timestamp(&new.purchase_date),
        ],
        sale_from_row,
    )
    .optional()
    .map_err(|e| constraint_error(e, "Sale"))?
    .ok_or_else(|| Error::NotFound(format!("Sale '{id}'")))
}

pub fn get_sale(conn: &Connection, id: &str) -> Result<Sale> {
    conn.query_row(
        &format!("SELECT {SALE_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        sale_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Sale '{id}'")))
}

pub fn delete_sale(conn: &Connection, id: &str) -> Result<()> {
    delete_by_id(conn, "transactions", "Sale", id)
}

/// Sales inside `window`, newest first, capped at `limit`. Also returns the
/// uncapped match count.
pub fn list_sales(
    conn: &Connection,
    window: &PeriodWindow,
    limit: u32,
) -> rusqlite::Result<(Vec<Sale>, u64)> {
    let start = to_sql_timestamp(&window.start);
    let end = to_sql_timestamp(&window.end);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE purchase_date BETWEEN ?1 AND ?2",
        params![start, end],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {SALE_COLUMNS}
         FROM transactions
         WHERE purchase_date BETWEEN ?1 AND ?2
         ORDER BY purchase_date DESC
         LIMIT ?3"
    ))?;
    let rows = stmt.query_map(params![start, end, limit], sale_from_row)?;
    let sales = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((sales, total as u64))
}

/// One page of every sale ever recorded, newest first, plus the total count.
pub fn list_all_sales(
    conn: &Connection,
    limit: u32,
    offset: u32,
) -> rusqlite::Result<(Vec<Sale>, u64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {SALE_COLUMNS}
         FROM transactions
         ORDER BY purchase_date DESC, id
         LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(params![limit, offset], sale_from_row)?;
    let sales = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((sales, total as u64))
}

const SALE_COLUMNS: &str =
    "id, customer, address, quantity, total_price, purchase_date, created_at, updated_at";

fn sale_from_row(row: &Row<'_>) -> rusqlite::Result<Sale> {
    Ok(Sale {
        id: row.get(0)?,
        customer: row.get(1)?,
        address: row.get(2)?,
        quantity: row.get(3)?,
        total_price: row.get(4)?,
        purchase_date: timestamp_at(row, 5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}

// ── Pay records ────────────────────────────────────────────────────

const PAY_COLUMNS: &str =
    "id, period_start, period_end, total_production, computed_pay, created_at, updated_at";

fn pay_record_from_row(row: &Row<'_>) -> rusqlite::Result<PeriodPayRecord> {
    Ok(PeriodPayRecord {
        id: row.get(0)?,
        period_start: timestamp_at(row, 1)?,
        period_end: timestamp_at(row, 2)?,
        total_production_units: row.get(3)?,
        computed_pay: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

/// The pay record for exactly this window, if one exists.
pub fn find_pay_record(
    conn: &Connection,
    window: &PeriodWindow,
) -> rusqlite::Result<Option<PeriodPayRecord>> {
    conn.query_row(
        &format!(
            "SELECT {PAY_COLUMNS} FROM employee_pay WHERE period_start = ?1 AND period_end = ?2"
        ),
        params![to_sql_timestamp(&window.start), to_sql_timestamp(&window.end)],
        pay_record_from_row,
    )
    .optional()
}

/// Insert the pay record for `window` unless one already exists.
///
/// The existence check and the insert share a transaction, and the table's
/// `UNIQUE(period_start, period_end)` backs it up, so a window never gets a
/// second record and an existing record is never overwritten.
pub fn insert_pay_record_once(
    conn: &mut Connection,
    window: &PeriodWindow,
    total_production_units: i64,
    computed_pay: f64,
) -> Result<InsertOnce<PeriodPayRecord>> {
    let tx = conn.transaction()?;

    if let Some(existing) = find_pay_record(&tx, window)? {
        return Ok(InsertOnce::Existing(existing));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let record = tx
        .query_row(
            &format!(
                "INSERT INTO employee_pay (id, period_start, period_end, total_production, computed_pay)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {PAY_COLUMNS}"
            ),
            params![
                id,
                to_sql_timestamp(&window.start),
                to_sql_timestamp(&window.end),
                total_production_units,
                computed_pay,
            ],
            pay_record_from_row,
        )
        .map_err(|e| constraint_error(e, "Pay record for this period"))?;

    tx.commit()?;
    Ok(InsertOnce::Inserted(record))
}

/// Pay records whose period overlaps `window`, oldest first.
pub fn list_pay_records_overlapping(
    conn: &Connection,
    window: &PeriodWindow,
) -> rusqlite::Result<Vec<PeriodPayRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAY_COLUMNS} FROM employee_pay
         WHERE period_start <= ?2 AND period_end >= ?1
         ORDER BY period_start"
    ))?;
    let rows = stmt.query_map(
        params![to_sql_timestamp(&window.start), to_sql_timestamp(&window.end)],
        pay_record_from_row,
    )?;
    rows.collect()
}

/// The pay record whose period contains `instant`, if any.
pub fn find_pay_record_covering(
    conn: &Connection,
    instant: &NaiveDateTime,
) -> rusqlite::Result<Option<PeriodPayRecord>> {
    conn.query_row(
        &format!(
            "SELECT {PAY_COLUMNS} FROM employee_pay
             WHERE ?1 BETWEEN period_start AND period_end
             ORDER BY period_start DESC
             LIMIT 1"
        ),
        params![to_sql_timestamp(instant)],
        pay_record_from_row,
    )
    .optional()
}

// ── Status ─────────────────────────────────────────────────────────

pub fn store_status(conn: &Connection) -> rusqlite::Result<StoreStatus> {
    let count = |table: &str| -> rusqlite::Result<u64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as u64)
    };

    let latest_pay = conn
        .query_row(
            &format!("SELECT {PAY_COLUMNS} FROM employee_pay ORDER BY period_start DESC LIMIT 1"),
            [],
            pay_record_from_row,
        )
        .optional()?;

    Ok(StoreStatus {
        cement_stocks: count("cement_stocks")?,
        sand_purchases: count("sand_purchases")?,
        productions: count("productions")?,
        sales: count("transactions")?,
        pay_records: count("employee_pay")?,
        latest_pay,
    })
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = {NOW_SQL}"
        ),
        params![key, value],
    )?;
    Ok(())
}

pub fn unset_config(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
    Ok(count > 0)
}

pub fn list_config(conn: &Connection) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Helpers ────────────────────────────────────────────────────────

/// Current local time in the stored timestamp format, matching the column
/// defaults in the schema.
const NOW_SQL: &str = "strftime('%Y-%m-%d %H:%M:%f000', 'now', 'localtime')";

fn delete_by_id(conn: &Connection, table: &str, what: &str, id: &str) -> Result<()> {
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    if deleted == 0 {
        return Err(Error::NotFound(format!("{what} '{id}'")));
    }
    Ok(())
}

/// Read a stored timestamp column.
pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_sql_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

/// Map constraint violations on insert or update to domain errors;
/// everything else stays a database error.
fn constraint_error(e: rusqlite::Error, what: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        match err.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return Error::Conflict(format!("{what} already exists"));
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return Error::Validation(format!("{what} references a missing type"));
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => {
                return Error::Validation(format!("{what} has out-of-range values"));
            }
            _ => {}
        }
    }
    Error::from(e)
}
