//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over table `parcel`.
//! - Gate address change and deletion on the `registered` status.
//!
//! # Invariants
//! - `number` is assigned by SQLite on insert and never rewritten.
//! - Guarded mutations repeat the `status = 'registered'` condition in the
//!   write itself, so a status change between guard and write cannot slip
//!   through. A rejected guard leaves the row untouched.
//! - Guarded mutations open no transaction of their own and work on a
//!   connection that is already inside one.
//! - `set_status` is unconditional and does not check existence.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::parcel::{ClientId, Parcel, ParcelNumber, PARCEL_STATUS_REGISTERED};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

const PARCEL_REQUIRED_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from parcel repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Storage failure: connection, constraint or row decode error.
    Db(DbError),
    /// No row has the given number.
    NotFound(ParcelNumber),
    /// Row exists but its status is not `registered`.
    NotRegistered(ParcelNumber),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered(_))
    }

    /// True for everything that is not a semantic outcome of the parcel rules.
    pub fn is_storage(&self) -> bool {
        !self.is_not_found() && !self.is_not_registered()
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::NotRegistered(number) => write!(f, "parcel {number} is not registered"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "parcel repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "parcel repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "parcel repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::NotRegistered(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Failure of a client listing, together with the rows decoded before it.
///
/// `parcels` is empty when the query failed before yielding any row.
#[derive(Debug)]
pub struct PartialListError {
    pub parcels: Vec<Parcel>,
    pub source: RepoError,
}

impl PartialListError {
    /// Drops the partial rows and keeps the cause.
    pub fn into_source(self) -> RepoError {
        self.source
    }
}

impl Display for PartialListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parcel listing stopped after {} row(s): {}",
            self.parcels.len(),
            self.source
        )
    }
}

impl Error for PartialListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

impl From<PartialListError> for RepoError {
    fn from(value: PartialListError) -> Self {
        value.source
    }
}

/// Repository interface for parcel storage.
pub trait ParcelRepository {
    /// Inserts a parcel and returns its storage-assigned number.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel; `NotFound` when absent.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Loads every parcel of one client.
    ///
    /// On failure the error still carries the rows read so far.
    fn get_by_client(&self, client: ClientId) -> Result<Vec<Parcel>, PartialListError>;
    /// Overwrites status without any transition check.
    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()>;
    /// Overwrites address; only for `registered` parcels.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Removes the row; only for `registered` parcels.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
}

/// SQLite-backed parcel repository borrowing a caller-owned connection.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is not the latest.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when `parcel` is incomplete.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_parcel_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Runs `write` only for a `registered` parcel.
    ///
    /// `write` must carry `AND status = ?2` bound to `registered`; zero changed
    /// rows then means the parcel was deleted or moved on after the guard read.
    fn guarded_write<F>(&self, number: ParcelNumber, write: F) -> RepoResult<()>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        if !is_registered(self.conn, number)? {
            return Err(RepoError::NotRegistered(number));
        }
        if write(self.conn)? == 0 {
            // Not matched at write time: surface `NotFound` if the row is gone.
            is_registered(self.conn, number)?;
            return Err(RepoError::NotRegistered(number));
        }
        Ok(())
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        let number = self.conn.query_row(
            "INSERT INTO parcel (client, status, address, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING number;",
            params![
                parcel.client,
                parcel.status.as_str(),
                parcel.address.as_str(),
                parcel.created_at.as_str(),
            ],
            |row| row.get(0),
        )?;
        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.conn
            .query_row(
                &format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"),
                [number],
                parse_parcel_row,
            )
            .optional()?
            .ok_or(RepoError::NotFound(number))
    }

    fn get_by_client(&self, client: ClientId) -> Result<Vec<Parcel>, PartialListError> {
        let mut parcels = Vec::new();
        match collect_client_parcels(self.conn, client, &mut parcels) {
            Ok(()) => Ok(parcels),
            Err(source) => Err(PartialListError { parcels, source }),
        }
    }

    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE parcel SET status = ?2 WHERE number = ?1;",
            params![number, status],
        )?;
        Ok(())
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.guarded_write(number, |conn| {
            conn.execute(
                "UPDATE parcel SET address = ?3 WHERE number = ?1 AND status = ?2;",
                params![number, PARCEL_STATUS_REGISTERED, address],
            )
        })
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        self.guarded_write(number, |conn| {
            conn.execute(
                "DELETE FROM parcel WHERE number = ?1 AND status = ?2;",
                params![number, PARCEL_STATUS_REGISTERED],
            )
        })
    }
}

fn collect_client_parcels(
    conn: &Connection,
    client: ClientId,
    out: &mut Vec<Parcel>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare(&format!(
        "{PARCEL_SELECT_SQL} WHERE client = ?1 ORDER BY number ASC;"
    ))?;
    let mut rows = stmt.query([client])?;
    while let Some(row) = rows.next()? {
        out.push(parse_parcel_row(row)?);
    }
    Ok(())
}

/// Reads only `status` for `number`; `NotFound` when the row is missing.
fn is_registered(conn: &Connection, number: ParcelNumber) -> RepoResult<bool> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM parcel WHERE number = ?1;",
            [number],
            |row| row.get(0),
        )
        .optional()?;
    match status {
        Some(status) => Ok(status == PARCEL_STATUS_REGISTERED),
        None => Err(RepoError::NotFound(number)),
    }
}

fn parse_parcel_row(row: &Row<'_>) -> rusqlite::Result<Parcel> {
    Ok(Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status: row.get("status")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_parcel_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "parcel")? {
        return Err(RepoError::MissingRequiredTable("parcel"));
    }

    for column in PARCEL_REQUIRED_COLUMNS {
        if !table_has_column(conn, "parcel", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "parcel",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
