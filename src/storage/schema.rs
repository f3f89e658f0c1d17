use rusqlite::params;

/// Cement brands stocked by the yard.
pub const CEMENT_TYPES: &[&str] = &["Tiga Roda", "Conch", "Merdeka", "Padang", "Rajawali"];

/// Sand grades bought by the truckload.
pub const SAND_TYPES: &[&str] = &["Putih", "Kuning"];

/// Populate cement_types and sand_types. Called on DB open; existing names
/// are left untouched.
pub fn ensure_material_types(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO cement_types (name) VALUES (?1)")?;
    for name in CEMENT_TYPES {
        stmt.execute(params![name])?;
    }

    let mut stmt = conn.prepare("INSERT OR IGNORE INTO sand_types (name) VALUES (?1)")?;
    for name in SAND_TYPES {
        stmt.execute(params![name])?;
    }
    Ok(())
}
