//! Defines the report metadata model and its database queries.
//!
//! A report row records that a spreadsheet export was generated; the file
//! itself lives on disk at `file_path`. Report ids are assigned
//! sequentially by the database, unlike the caller-generated ledger ids.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::DatabaseId};

/// Metadata for one generated export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Sequential id assigned by the database.
    pub id: DatabaseId,
    /// Name of the account the report covers.
    pub account_name: String,
    /// The generated file's name.
    pub file_name: String,
    /// Absolute path of the generated file.
    pub file_path: String,
    /// Human-readable date-range label, e.g. `"01 Jan, 2025 - 31 Jan, 2025"`.
    pub date_range: String,
    /// When the report was generated.
    pub generated_on: Date,
}

/// The fields of a report before the database has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    /// Name of the account the report covers.
    pub account_name: String,
    /// The generated file's name.
    pub file_name: String,
    /// Absolute path of the generated file.
    pub file_path: String,
    /// Human-readable date-range label.
    pub date_range: String,
    /// When the report was generated.
    pub generated_on: Date,
}

/// Create the report table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_report_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS report (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                date_range TEXT NOT NULL,
                generated_on TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Report].
pub fn map_row_to_report(row: &Row) -> Result<Report, rusqlite::Error> {
    Ok(Report {
        id: row.get(0)?,
        account_name: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        date_range: row.get(4)?,
        generated_on: row.get(5)?,
    })
}

/// Insert a report row and return it with its assigned id.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn insert_report(report: NewReport, connection: &Connection) -> Result<Report, Error> {
    let report = connection
        .prepare(
            "INSERT INTO report (account_name, file_name, file_path, date_range, generated_on)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, account_name, file_name, file_path, date_range, generated_on",
        )?
        .query_row(
            (
                report.account_name,
                report.file_name,
                report.file_path,
                report.date_range,
                report.generated_on,
            ),
            map_row_to_report,
        )?;

    Ok(report)
}

/// Retrieve all reports, newest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_all_reports(connection: &Connection) -> Result<Vec<Report>, Error> {
    connection
        .prepare(
            "SELECT id, account_name, file_name, file_path, date_range, generated_on
             FROM report ORDER BY id DESC",
        )?
        .query_map([], map_row_to_report)?
        .map(|maybe_report| maybe_report.map_err(Error::from))
        .collect()
}

/// Delete a report row by its id.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing report,
/// - or [Error::Sql] if there is some other SQL error.
pub fn delete_report(id: DatabaseId, connection: &Connection) -> Result<(), Error> {
    let rows = connection.execute("DELETE FROM report WHERE id = ?1", (id,))?;

    if rows == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
