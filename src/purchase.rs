//! Defines the purchase model and its database queries.
//!
//! A purchase is one credit-incurring line item against an account. It is
//! immutable once created; the owning account's name and profile image are
//! denormalized into the row so history renders correctly even if the
//! account is later renamed.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::{Account, AccountId},
    database_id::{self, DatabaseId},
};

/// One credit-incurring transaction against an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    /// Caller-generated id, shared with the remote document key.
    pub id: DatabaseId,
    /// The account that made the purchase.
    pub account_id: AccountId,
    /// Account name at the time of purchase.
    pub account_name: String,
    /// Account profile image at the time of purchase.
    #[serde(default)]
    pub account_profile: Option<String>,
    /// What was bought.
    pub item_name: String,
    /// The purchase amount.
    pub amount: f64,
    /// The calendar date of the purchase, used for exact-date queries.
    pub date: Date,
    /// Epoch milliseconds, used for range queries and default ordering.
    pub timestamp: i64,
}

impl Purchase {
    /// Create a purchase against `account` with a fresh id, capturing the
    /// account's name and profile image as they are right now.
    pub fn new(account: &Account, item_name: &str, amount: f64, date: Date, timestamp: i64) -> Self {
        Self {
            id: database_id::generate_id(),
            account_id: account.id,
            account_name: account.name.clone(),
            account_profile: account.profile_image.clone(),
            item_name: item_name.to_owned(),
            amount,
            date,
            timestamp,
        }
    }
}

/// Create the purchase table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_purchase_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS purchase (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL,
                account_name TEXT NOT NULL,
                account_profile TEXT,
                item_name TEXT NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                timestamp INTEGER NOT NULL
                )",
        (),
    )?;

    // Covers the per-account exact-date query.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_purchase_account_date ON purchase(account_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Purchase].
pub fn map_row_to_purchase(row: &Row) -> Result<Purchase, rusqlite::Error> {
    Ok(Purchase {
        id: row.get(0)?,
        account_id: row.get(1)?,
        account_name: row.get(2)?,
        account_profile: row.get(3)?,
        item_name: row.get(4)?,
        amount: row.get(5)?,
        date: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

const PURCHASE_COLUMNS: &str =
    "id, account_id, account_name, account_profile, item_name, amount, date, timestamp";

/// Insert a new purchase row.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateId] if a purchase with the same id already exists,
/// - or [Error::Sql] if there is some other SQL error.
pub fn insert_purchase(purchase: &Purchase, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO purchase (id, account_id, account_name, account_profile, item_name,
                amount, date, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            purchase.id,
            purchase.account_id,
            &purchase.account_name,
            &purchase.account_profile,
            &purchase.item_name,
            purchase.amount,
            purchase.date,
            purchase.timestamp,
        ),
    )?;

    Ok(())
}

/// Insert a purchase row, replacing an existing row with the same id. Used
/// by the restore path, where remote state wins.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn upsert_purchase(purchase: &Purchase, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO purchase (id, account_id, account_name, account_profile, item_name,
                amount, date, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                account_name = excluded.account_name,
                account_profile = excluded.account_profile,
                item_name = excluded.item_name,
                amount = excluded.amount,
                date = excluded.date,
                timestamp = excluded.timestamp",
        (
            purchase.id,
            purchase.account_id,
            &purchase.account_name,
            &purchase.account_profile,
            &purchase.item_name,
            purchase.amount,
            purchase.date,
            purchase.timestamp,
        ),
    )?;

    Ok(())
}

/// Retrieve all purchases for an account, oldest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_purchases_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Purchase>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase
             WHERE account_id = :account_id ORDER BY timestamp ASC"
        ))?
        .query_map(&[(":account_id", &account_id)], map_row_to_purchase)?
        .map(|maybe_purchase| maybe_purchase.map_err(Error::from))
        .collect()
}

/// Retrieve the purchases an account made on exactly `date`.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_purchases_on_date(
    account_id: AccountId,
    date: Date,
    connection: &Connection,
) -> Result<Vec<Purchase>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase
             WHERE account_id = :account_id AND date = :date ORDER BY timestamp ASC"
        ))?
        .query_map(
            rusqlite::named_params! {":account_id": account_id, ":date": date},
            map_row_to_purchase,
        )?
        .map(|maybe_purchase| maybe_purchase.map_err(Error::from))
        .collect()
}

/// Retrieve the purchases an account made between `start` and `end` epoch
/// milliseconds, both inclusive. Callers are responsible for extending
/// `end` to the last millisecond of the final day, see
/// [crate::dates::day_range_millis].
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_purchases_in_range(
    account_id: AccountId,
    start: i64,
    end: i64,
    connection: &Connection,
) -> Result<Vec<Purchase>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase
             WHERE account_id = :account_id AND timestamp BETWEEN :start AND :end
             ORDER BY timestamp ASC"
        ))?
        .query_map(
            rusqlite::named_params! {":account_id": account_id, ":start": start, ":end": end},
            map_row_to_purchase,
        )?
        .map(|maybe_purchase| maybe_purchase.map_err(Error::from))
        .collect()
}

/// Retrieve every purchase in the store, oldest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_all_purchases(connection: &Connection) -> Result<Vec<Purchase>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase ORDER BY timestamp ASC"
        ))?
        .query_map([], map_row_to_purchase)?
        .map(|maybe_purchase| maybe_purchase.map_err(Error::from))
        .collect()
}

/// Delete every purchase belonging to an account.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn delete_purchases_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute("DELETE FROM purchase WHERE account_id = ?1", (account_id,))?;

    Ok(())
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_purchase_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_purchase_table(&connection));
    }
}
