use rusqlite::{Connection, ErrorCode, ffi, functions::FunctionFlags};

use std::path::PathBuf;
use std::time::Duration;

use crate::geo::{self, Coordinates};

pub mod accounts;
pub mod feed;
pub mod listings;
pub mod profiles;
pub mod reshape;
pub mod schema;
pub mod social;

pub type DBResult<T> = rusqlite::Result<T>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Keeps `IN (...)` lists well below SQLite's bound parameter limit
pub(crate) const ID_CHUNK_SIZE: usize = 500;

/// Handle to the marketplace database file.
///
/// Cheap to clone; every operation opens its own connection through [`Database::connect`].
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Opens a connection with foreign keys enforced and the distance function registered.
    pub fn connect(&self) -> DBResult<Connection> {
        let connection = Connection::open(&self.path)?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        connection.pragma_update(None, "foreign_keys", true)?;
        register_functions(&connection)?;

        Ok(connection)
    }

    /// Creates every table and index that doesn't exist yet.
    pub fn initialize(&self) -> DBResult<()> {
        let connection = self.connect()?;

        for (name, table_schema) in schema::TABLES {
            log::debug!("[initialize_db] creating {name} table...");
            connection.execute(table_schema, [])?;
        }

        log::debug!("[initialize_db] creating indexes...");
        connection.execute_batch(schema::INDEXES)?;

        log::info!("Database at {} is ready.", self.path.display());
        Ok(())
    }
}

fn register_functions(connection: &Connection) -> DBResult<()> {
    connection.create_scalar_function(
        geo::SQL_DISTANCE_FN,
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let from = Coordinates::new(ctx.get::<f64>(0)?, ctx.get::<f64>(1)?);
            let to = Coordinates::new(ctx.get::<f64>(2)?, ctx.get::<f64>(3)?);
            Ok(geo::haversine_miles(from, to))
        },
    )
}

/// Turns a uniqueness violation into `Ok(false)` so inserts can be idempotent.
/// Every other error, foreign key violations included, is passed through.
pub fn swallow_constraint_violation(err: rusqlite::Error) -> DBResult<bool> {
    match unique_violation(&err) {
        Some(_) => Ok(false),
        None => Err(err),
    }
}

/// If `err` is a UNIQUE/PRIMARY KEY violation, returns the offending `Table.Column` list.
pub fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            Some(
                message
                    .as_deref()
                    .and_then(|m| m.split_once(": ").map(|(_, columns)| columns))
                    .unwrap_or_default(),
            )
        }
        _ => None,
    }
}

/// Builds `?, ?, ?` for an `IN (...)` list of `count` bound values.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
