//! Defines the account model and its database queries.
//!
//! An account is one counterparty whose credit history is tracked. The
//! derived counters (`purchase_count`, `total_purchases`, `total_paid`,
//! `remaining_balance`) are maintained by exact-amount increments inside
//! the store's compound operations and are never recomputed from history
//! on read.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id, dates};

/// The id for an account.
pub type AccountId = database_id::DatabaseId;

/// A counterparty ledger: one customer buying on credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Caller-generated id, shared with the remote document key.
    pub id: AccountId,
    /// The customer's display name.
    pub name: String,
    /// Local file path or remote URL of the customer's profile image.
    #[serde(default)]
    pub profile_image: Option<String>,
    /// Email of the linked app user, if the customer uses the app too.
    #[serde(default)]
    pub linked_email: Option<String>,
    /// Prepaid credit held for the customer. `None` counts as zero.
    #[serde(default)]
    pub deposit: Option<f64>,
    /// When the account was created.
    pub created_on: Date,
    /// Number of purchases recorded against the account.
    #[serde(default)]
    pub purchase_count: i64,
    /// Sum of all purchase amounts.
    #[serde(default)]
    pub total_purchases: f64,
    /// Sum of all payment amounts.
    #[serde(default)]
    pub total_paid: f64,
    /// Net amount owed: `total_purchases - total_paid`. May go negative
    /// when the customer overpays.
    #[serde(default)]
    pub remaining_balance: f64,
}

impl Account {
    /// Create a new account with a fresh id, today's date, and zeroed
    /// counters.
    pub fn new(name: &str) -> Self {
        Self {
            id: database_id::generate_id(),
            name: name.to_owned(),
            profile_image: None,
            linked_email: None,
            deposit: None,
            created_on: dates::today(),
            purchase_count: 0,
            total_purchases: 0.0,
            total_paid: 0.0,
            remaining_balance: 0.0,
        }
    }
}

/// Create the account table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                profile_image TEXT,
                linked_email TEXT,
                deposit REAL,
                created_on TEXT NOT NULL,
                purchase_count INTEGER NOT NULL DEFAULT 0,
                total_purchases REAL NOT NULL DEFAULT 0,
                total_paid REAL NOT NULL DEFAULT 0,
                remaining_balance REAL NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [Account].
pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        profile_image: row.get(2)?,
        linked_email: row.get(3)?,
        deposit: row.get(4)?,
        created_on: row.get(5)?,
        purchase_count: row.get(6)?,
        total_purchases: row.get(7)?,
        total_paid: row.get(8)?,
        remaining_balance: row.get(9)?,
    })
}

/// Insert a new account row.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateId] if an account with the same id already exists,
/// - or [Error::Sql] if there is some other SQL error.
pub fn insert_account(account: &Account, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO account (id, name, profile_image, linked_email, deposit, created_on,
                purchase_count, total_purchases, total_paid, remaining_balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        (
            account.id,
            &account.name,
            &account.profile_image,
            &account.linked_email,
            account.deposit,
            account.created_on,
            account.purchase_count,
            account.total_purchases,
            account.total_paid,
            account.remaining_balance,
        ),
    )?;

    Ok(())
}

/// Insert an account row, replacing every field of an existing row with the
/// same id. Used by the restore path, where remote state wins.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn upsert_account(account: &Account, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO account (id, name, profile_image, linked_email, deposit, created_on,
                purchase_count, total_purchases, total_paid, remaining_balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                profile_image = excluded.profile_image,
                linked_email = excluded.linked_email,
                deposit = excluded.deposit,
                created_on = excluded.created_on,
                purchase_count = excluded.purchase_count,
                total_purchases = excluded.total_purchases,
                total_paid = excluded.total_paid,
                remaining_balance = excluded.remaining_balance",
        (
            account.id,
            &account.name,
            &account.profile_image,
            &account.linked_email,
            account.deposit,
            account.created_on,
            account.purchase_count,
            account.total_purchases,
            account.total_paid,
            account.remaining_balance,
        ),
    )?;

    Ok(())
}

/// Retrieve an account by its id. A missing row is `None`, not an error.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_account_by_id(
    id: AccountId,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    let account = connection
        .prepare(
            "SELECT id, name, profile_image, linked_email, deposit, created_on,
                    purchase_count, total_purchases, total_paid, remaining_balance
             FROM account WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_row_to_account)
        .optional()?;

    Ok(account)
}

/// Retrieve all accounts. Order is not meaningful.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_all_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, name, profile_image, linked_email, deposit, created_on,
                    purchase_count, total_purchases, total_paid, remaining_balance
             FROM account",
        )?
        .query_map([], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Set the deposit value for an account.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing account,
/// - or [Error::Sql] if there is some other SQL error.
pub fn update_account_deposit(
    id: AccountId,
    deposit: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows = connection.execute(
        "UPDATE account SET deposit = ?1 WHERE id = ?2",
        (deposit, id),
    )?;

    if rows == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Apply a purchase of `amount` to an account's derived counters.
///
/// The counters are adjusted by the exact transaction amount rather than
/// recomputed from history, so this must run inside the same transaction as
/// the purchase insert.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing account,
/// - or [Error::Sql] if there is some other SQL error.
pub fn apply_purchase_to_account(
    id: AccountId,
    amount: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows = connection.execute(
        "UPDATE account SET purchase_count = purchase_count + 1,
                total_purchases = total_purchases + ?1,
                remaining_balance = remaining_balance + ?1
             WHERE id = ?2",
        (amount, id),
    )?;

    if rows == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Apply a payment of `amount` to an account's derived counters.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing account,
/// - or [Error::Sql] if there is some other SQL error.
pub fn apply_payment_to_account(
    id: AccountId,
    amount: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows = connection.execute(
        "UPDATE account SET total_paid = total_paid + ?1,
                remaining_balance = remaining_balance - ?1
             WHERE id = ?2",
        (amount, id),
    )?;

    if rows == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete an account row. Purchases and payments are removed separately by
/// the store's cascading delete.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn delete_account_row(id: AccountId, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM account WHERE id = ?1", (id,))?;

    Ok(())
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_account_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_account_table(&connection));
    }
}

#[cfg(test)]
mod account_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::Error;

    use super::{
        Account, apply_payment_to_account, apply_purchase_to_account, create_account_table,
        get_account_by_id, get_all_accounts, insert_account, update_account_deposit,
        upsert_account,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_account_table(&conn).unwrap();
        conn
    }

    fn test_account(id: i64, name: &str) -> Account {
        Account {
            id,
            name: name.to_owned(),
            profile_image: None,
            linked_email: None,
            deposit: None,
            created_on: date!(2025 - 01 - 01),
            purchase_count: 0,
            total_purchases: 0.0,
            total_paid: 0.0,
            remaining_balance: 0.0,
        }
    }

    #[test]
    fn insert_and_get_round_trips() {
        let conn = get_test_connection();
        let account = Account {
            profile_image: Some("/images/ravi.jpg".to_owned()),
            deposit: Some(25.0),
            ..test_account(1, "Ravi")
        };

        insert_account(&account, &conn).unwrap();
        let selected = get_account_by_id(1, &conn).unwrap();

        assert_eq!(selected, Some(account));
    }

    #[test]
    fn insert_fails_on_duplicate_id() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();

        let result = insert_account(&test_account(1, "Meena"), &conn);

        assert_eq!(result, Err(Error::DuplicateId));
    }

    #[test]
    fn get_missing_account_is_none() {
        let conn = get_test_connection();

        assert_eq!(get_account_by_id(1337, &conn).unwrap(), None);
    }

    #[test]
    fn get_all_returns_every_account() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();
        insert_account(&test_account(2, "Meena"), &conn).unwrap();

        let accounts = get_all_accounts(&conn).unwrap();

        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();

        let replacement = Account {
            remaining_balance: 80.0,
            ..test_account(1, "Ravi K")
        };
        upsert_account(&replacement, &conn).unwrap();

        let selected = get_account_by_id(1, &conn).unwrap().unwrap();
        assert_eq!(selected.name, "Ravi K");
        assert_eq!(selected.remaining_balance, 80.0);
    }

    #[test]
    fn purchase_increments_counters() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();

        apply_purchase_to_account(1, 120.0, &conn).unwrap();
        apply_purchase_to_account(1, 30.0, &conn).unwrap();

        let account = get_account_by_id(1, &conn).unwrap().unwrap();
        assert_eq!(account.purchase_count, 2);
        assert_eq!(account.total_purchases, 150.0);
        assert_eq!(account.remaining_balance, 150.0);
    }

    #[test]
    fn payment_decrements_balance() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();
        apply_purchase_to_account(1, 100.0, &conn).unwrap();

        apply_payment_to_account(1, 40.0, &conn).unwrap();

        let account = get_account_by_id(1, &conn).unwrap().unwrap();
        assert_eq!(account.total_paid, 40.0);
        assert_eq!(account.remaining_balance, 60.0);
    }

    #[test]
    fn counter_update_fails_on_missing_account() {
        let conn = get_test_connection();

        assert_eq!(
            apply_purchase_to_account(42, 10.0, &conn),
            Err(Error::NotFound)
        );
        assert_eq!(
            apply_payment_to_account(42, 10.0, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn deposit_update_sets_value() {
        let conn = get_test_connection();
        insert_account(&test_account(1, "Ravi"), &conn).unwrap();

        update_account_deposit(1, 75.5, &conn).unwrap();

        let account = get_account_by_id(1, &conn).unwrap().unwrap();
        assert_eq!(account.deposit, Some(75.5));
    }

    #[test]
    fn deposit_update_fails_on_missing_account() {
        let conn = get_test_connection();

        assert_eq!(update_account_deposit(42, 10.0, &conn), Err(Error::NotFound));
    }
}
