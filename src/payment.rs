//! Defines the payment model and its database queries.
//!
//! A payment is one credit-reducing transaction against an account. Like
//! purchases, payments carry a denormalized snapshot of the account's name
//! and profile image, plus a month label computed once at creation time.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::{Account, AccountId},
    database_id::{self, DatabaseId},
    dates,
};

/// One credit-reducing transaction against an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Caller-generated id, shared with the remote document key.
    pub id: DatabaseId,
    /// The account that paid.
    pub account_id: AccountId,
    /// Account name at the time of payment.
    pub account_name: String,
    /// Account profile image at the time of payment.
    #[serde(default)]
    pub account_profile: Option<String>,
    /// The payment amount.
    pub amount: f64,
    /// The calendar date of the payment.
    pub date: Date,
    /// Month label computed at creation time, e.g. `"January"`.
    pub month: String,
    /// Epoch milliseconds, used for default ordering.
    pub timestamp: i64,
}

impl Payment {
    /// Create a payment from `account` with a fresh id, capturing the
    /// account snapshot and the month label for `date`.
    pub fn new(account: &Account, amount: f64, date: Date, timestamp: i64) -> Self {
        Self {
            id: database_id::generate_id(),
            account_id: account.id,
            account_name: account.name.clone(),
            account_profile: account.profile_image.clone(),
            amount,
            date,
            month: dates::month_name(date),
            timestamp,
        }
    }
}

/// Create the payment table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_payment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS payment (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL,
                account_name TEXT NOT NULL,
                account_profile TEXT,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                month TEXT NOT NULL,
                timestamp INTEGER NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_payment_account ON payment(account_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Payment].
pub fn map_row_to_payment(row: &Row) -> Result<Payment, rusqlite::Error> {
    Ok(Payment {
        id: row.get(0)?,
        account_id: row.get(1)?,
        account_name: row.get(2)?,
        account_profile: row.get(3)?,
        amount: row.get(4)?,
        date: row.get(5)?,
        month: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

const PAYMENT_COLUMNS: &str =
    "id, account_id, account_name, account_profile, amount, date, month, timestamp";

/// Insert a new payment row.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateId] if a payment with the same id already exists,
/// - or [Error::Sql] if there is some other SQL error.
pub fn insert_payment(payment: &Payment, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO payment (id, account_id, account_name, account_profile, amount,
                date, month, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            payment.id,
            payment.account_id,
            &payment.account_name,
            &payment.account_profile,
            payment.amount,
            payment.date,
            &payment.month,
            payment.timestamp,
        ),
    )?;

    Ok(())
}

/// Insert a payment row, replacing an existing row with the same id. Used
/// by the restore path, where remote state wins.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn upsert_payment(payment: &Payment, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO payment (id, account_id, account_name, account_profile, amount,
                date, month, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                account_name = excluded.account_name,
                account_profile = excluded.account_profile,
                amount = excluded.amount,
                date = excluded.date,
                month = excluded.month,
                timestamp = excluded.timestamp",
        (
            payment.id,
            payment.account_id,
            &payment.account_name,
            &payment.account_profile,
            payment.amount,
            payment.date,
            &payment.month,
            payment.timestamp,
        ),
    )?;

    Ok(())
}

/// Retrieve all payments for an account, oldest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_payments_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Payment>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment
             WHERE account_id = :account_id ORDER BY timestamp ASC"
        ))?
        .query_map(&[(":account_id", &account_id)], map_row_to_payment)?
        .map(|maybe_payment| maybe_payment.map_err(Error::from))
        .collect()
}

/// Retrieve every payment in the store, oldest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_all_payments(connection: &Connection) -> Result<Vec<Payment>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment ORDER BY timestamp ASC"
        ))?
        .query_map([], map_row_to_payment)?
        .map(|maybe_payment| maybe_payment.map_err(Error::from))
        .collect()
}

/// Delete every payment belonging to an account.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn delete_payments_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute("DELETE FROM payment WHERE account_id = ?1", (account_id,))?;

    Ok(())
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_payment_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_payment_table(&connection));
    }
}

#[cfg(test)]
mod payment_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::Error;

    use super::{
        Payment, create_payment_table, delete_payments_for_account, get_all_payments,
        get_payments_for_account, insert_payment,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_payment_table(&conn).unwrap();
        conn
    }

    fn test_payment(id: i64, account_id: i64, timestamp: i64) -> Payment {
        Payment {
            id,
            account_id,
            account_name: "Ravi".to_owned(),
            account_profile: None,
            amount: 50.0,
            date: date!(2025 - 01 - 15),
            month: "January".to_owned(),
            timestamp,
        }
    }

    #[test]
    fn insert_and_get_round_trips() {
        let conn = get_test_connection();
        let payment = test_payment(1, 1, 100);

        insert_payment(&payment, &conn).unwrap();
        let payments = get_payments_for_account(1, &conn).unwrap();

        assert_eq!(payments, vec![payment]);
    }

    #[test]
    fn insert_fails_on_duplicate_id() {
        let conn = get_test_connection();
        insert_payment(&test_payment(1, 1, 100), &conn).unwrap();

        assert_eq!(
            insert_payment(&test_payment(1, 1, 200), &conn),
            Err(Error::DuplicateId)
        );
    }

    #[test]
    fn get_all_orders_by_timestamp() {
        let conn = get_test_connection();
        insert_payment(&test_payment(1, 1, 300), &conn).unwrap();
        insert_payment(&test_payment(2, 2, 100), &conn).unwrap();

        let payments = get_all_payments(&conn).unwrap();

        let ids: Vec<i64> = payments.iter().map(|payment| payment.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn delete_removes_only_that_account() {
        let conn = get_test_connection();
        insert_payment(&test_payment(1, 1, 100), &conn).unwrap();
        insert_payment(&test_payment(2, 2, 200), &conn).unwrap();

        delete_payments_for_account(1, &conn).unwrap();

        assert!(get_payments_for_account(1, &conn).unwrap().is_empty());
        assert_eq!(get_payments_for_account(2, &conn).unwrap().len(), 1);
    }

    #[test]
    fn new_payment_captures_month_label() {
        let account = crate::account::Account::new("Ravi");

        let payment = Payment::new(&account, 20.0, date!(2025 - 03 - 02), 100);

        assert_eq!(payment.month, "March");
        assert_eq!(payment.account_name, "Ravi");
    }
}
