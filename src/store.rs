//! The local entity store: the single source of truth for all reads.
//!
//! [LedgerStore] wraps one SQLite connection behind a mutex, which is the
//! write-serialization point for the whole process: the compound operations
//! read, adjust, and write an account's derived counters while holding the
//! lock, so concurrent purchases and payments against the same account can
//! never lose an increment.
//!
//! Every committed mutation broadcasts a table-change event; [LiveQuery]
//! subscribers re-run their query on matching events, which gives the UI a
//! continuously updated view without ever reading anything but this store.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;
use time::Date;
use tokio::sync::broadcast;

use crate::{
    Error, account,
    account::{Account, AccountId},
    chat,
    chat::{ChatMessage, NewChatMessage},
    database_id::DatabaseId,
    payment,
    payment::Payment,
    purchase,
    purchase::Purchase,
    report,
    report::{NewReport, Report},
};

/// The table a committed mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Accounts,
    Purchases,
    Payments,
    Reports,
    Chat,
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Create the tables for all entity kinds.
///
/// # Errors
/// Returns an error if any table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Exclusive,
    )?;

    account::create_account_table(&transaction)?;
    purchase::create_purchase_table(&transaction)?;
    payment::create_payment_table(&transaction)?;
    report::create_report_table(&transaction)?;
    chat::create_chat_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Handle to the local store. Cheap to clone; all clones share the same
/// connection and change channel.
#[derive(Clone)]
pub struct LedgerStore {
    connection: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<Change>,
}

impl LedgerStore {
    /// Open (or create) the store at `path` and initialize its schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a store backed by an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, Error> {
        initialize(&connection)?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            changes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|_| Error::DatabaseLock)
    }

    fn notify(&self, change: Change) {
        // send only fails when there are no subscribers.
        let _ = self.changes.send(change);
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Insert a new account.
    ///
    /// # Errors
    /// Returns [Error::DuplicateId] if the caller-generated id collides
    /// with an existing account.
    pub fn insert_account(&self, account: &Account) -> Result<(), Error> {
        account::insert_account(account, &*self.lock()?)?;
        self.notify(Change::Accounts);

        Ok(())
    }

    /// Retrieve an account by id. Missing rows are `None`, not an error.
    pub fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        account::get_account_by_id(id, &*self.lock()?)
    }

    /// Retrieve all accounts.
    pub fn get_all_accounts(&self) -> Result<Vec<Account>, Error> {
        account::get_all_accounts(&*self.lock()?)
    }

    /// Set an account's deposit value.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist.
    pub fn update_deposit(&self, id: AccountId, deposit: f64) -> Result<(), Error> {
        account::update_account_deposit(id, deposit, &*self.lock()?)?;
        self.notify(Change::Accounts);

        Ok(())
    }

    /// Delete an account together with all of its purchases and payments,
    /// atomically.
    ///
    /// # Errors
    /// Returns an error and leaves everything in place if any half of the
    /// cascade fails.
    pub fn delete_account_and_data(&self, id: AccountId) -> Result<(), Error> {
        {
            let mut connection = self.lock()?;
            let transaction = connection.transaction()?;

            purchase::delete_purchases_for_account(id, &transaction)?;
            payment::delete_payments_for_account(id, &transaction)?;
            account::delete_account_row(id, &transaction)?;

            transaction.commit()?;
        }

        self.notify(Change::Purchases);
        self.notify(Change::Payments);
        self.notify(Change::Accounts);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Purchases
    // ------------------------------------------------------------------

    /// Insert a purchase and update the owning account's counters in one
    /// transaction: `purchase_count` goes up by one, `total_purchases` and
    /// `remaining_balance` go up by the purchase amount.
    ///
    /// All-or-nothing: if the counter update fails the purchase row does
    /// not persist.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the owning account does not exist, or
    /// [Error::DuplicateId] on an id collision.
    pub fn record_purchase(&self, purchase: &Purchase) -> Result<(), Error> {
        {
            let mut connection = self.lock()?;
            let transaction = connection.transaction()?;

            purchase::insert_purchase(purchase, &transaction)?;
            account::apply_purchase_to_account(purchase.account_id, purchase.amount, &transaction)?;

            transaction.commit()?;
        }

        self.notify(Change::Purchases);
        self.notify(Change::Accounts);

        Ok(())
    }

    /// Retrieve all purchases for an account, oldest first.
    pub fn get_purchases_for_account(&self, account_id: AccountId) -> Result<Vec<Purchase>, Error> {
        purchase::get_purchases_for_account(account_id, &*self.lock()?)
    }

    /// Retrieve the purchases an account made on exactly `date`.
    pub fn get_purchases_on_date(
        &self,
        account_id: AccountId,
        date: Date,
    ) -> Result<Vec<Purchase>, Error> {
        purchase::get_purchases_on_date(account_id, date, &*self.lock()?)
    }

    /// Retrieve the purchases an account made between `start` and `end`
    /// epoch milliseconds, both inclusive.
    pub fn get_purchases_in_range(
        &self,
        account_id: AccountId,
        start: i64,
        end: i64,
    ) -> Result<Vec<Purchase>, Error> {
        purchase::get_purchases_in_range(account_id, start, end, &*self.lock()?)
    }

    /// Retrieve every purchase in the store.
    pub fn get_all_purchases(&self) -> Result<Vec<Purchase>, Error> {
        purchase::get_all_purchases(&*self.lock()?)
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Insert a payment and update the owning account's counters in one
    /// transaction: `total_paid` goes up and `remaining_balance` goes down
    /// by the payment amount. Overpayment is allowed; the balance may go
    /// negative.
    ///
    /// When the payment settles the account in full (the balance before the
    /// payment minus the amount is zero or less), the account's deposit is
    /// topped up by the payment amount in the same transaction, treating an
    /// absent deposit as zero.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the owning account does not exist, or
    /// [Error::DuplicateId] on an id collision.
    pub fn record_payment(&self, payment: &Payment) -> Result<(), Error> {
        {
            let mut connection = self.lock()?;
            let transaction = connection.transaction()?;

            let account = account::get_account_by_id(payment.account_id, &transaction)?
                .ok_or(Error::NotFound)?;

            payment::insert_payment(payment, &transaction)?;
            account::apply_payment_to_account(payment.account_id, payment.amount, &transaction)?;

            if account.remaining_balance - payment.amount <= 0.0 {
                let deposit = account.deposit.unwrap_or(0.0) + payment.amount;
                account::update_account_deposit(payment.account_id, deposit, &transaction)?;
            }

            transaction.commit()?;
        }

        self.notify(Change::Payments);
        self.notify(Change::Accounts);

        Ok(())
    }

    /// Retrieve all payments for an account, oldest first.
    pub fn get_payments_for_account(&self, account_id: AccountId) -> Result<Vec<Payment>, Error> {
        payment::get_payments_for_account(account_id, &*self.lock()?)
    }

    /// Retrieve every payment in the store.
    pub fn get_all_payments(&self) -> Result<Vec<Payment>, Error> {
        payment::get_all_payments(&*self.lock()?)
    }

    // ------------------------------------------------------------------
    // Restore (remote wins)
    // ------------------------------------------------------------------

    /// Upsert an account pulled from the remote store.
    pub fn restore_account(&self, account: &Account) -> Result<(), Error> {
        account::upsert_account(account, &*self.lock()?)?;
        self.notify(Change::Accounts);

        Ok(())
    }

    /// Upsert a purchase pulled from the remote store. The account counters
    /// are not touched: the remote account document already carries them.
    pub fn restore_purchase(&self, purchase: &Purchase) -> Result<(), Error> {
        purchase::upsert_purchase(purchase, &*self.lock()?)?;
        self.notify(Change::Purchases);

        Ok(())
    }

    /// Upsert a payment pulled from the remote store.
    pub fn restore_payment(&self, payment: &Payment) -> Result<(), Error> {
        payment::upsert_payment(payment, &*self.lock()?)?;
        self.notify(Change::Payments);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reports and chat
    // ------------------------------------------------------------------

    /// Record a generated report and return it with its assigned id.
    pub fn insert_report(&self, report: NewReport) -> Result<Report, Error> {
        let report = report::insert_report(report, &*self.lock()?)?;
        self.notify(Change::Reports);

        Ok(report)
    }

    /// Retrieve all reports, newest first.
    pub fn get_all_reports(&self) -> Result<Vec<Report>, Error> {
        report::get_all_reports(&*self.lock()?)
    }

    /// Delete a report row by id.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the report does not exist.
    pub fn delete_report(&self, id: DatabaseId) -> Result<(), Error> {
        report::delete_report(id, &*self.lock()?)?;
        self.notify(Change::Reports);

        Ok(())
    }

    /// Append a message to the chat transcript.
    pub fn insert_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage, Error> {
        let message = chat::insert_chat_message(message, &*self.lock()?)?;
        self.notify(Change::Chat);

        Ok(message)
    }

    /// Retrieve the whole chat transcript, oldest first.
    pub fn get_all_chat_messages(&self) -> Result<Vec<ChatMessage>, Error> {
        chat::get_all_chat_messages(&*self.lock()?)
    }

    /// Delete the entire chat transcript.
    pub fn clear_chat_history(&self) -> Result<(), Error> {
        chat::clear_chat_history(&*self.lock()?)?;
        self.notify(Change::Chat);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Live queries
    // ------------------------------------------------------------------

    /// A live view of all accounts. Emits the current list immediately and
    /// re-emits after every account write.
    pub fn watch_accounts(&self) -> LiveQuery<Vec<Account>> {
        LiveQuery::new(self.clone(), &[Change::Accounts], |store| {
            store.get_all_accounts()
        })
    }

    /// A live view of one account's purchases on exactly `date`.
    pub fn watch_purchases_on_date(
        &self,
        account_id: AccountId,
        date: Date,
    ) -> LiveQuery<Vec<Purchase>> {
        LiveQuery::new(self.clone(), &[Change::Purchases], move |store| {
            store.get_purchases_on_date(account_id, date)
        })
    }

    /// A live view of all reports, newest first.
    pub fn watch_reports(&self) -> LiveQuery<Vec<Report>> {
        LiveQuery::new(self.clone(), &[Change::Reports], |store| {
            store.get_all_reports()
        })
    }

    /// A live view of the chat transcript, oldest first.
    pub fn watch_chat_messages(&self) -> LiveQuery<Vec<ChatMessage>> {
        LiveQuery::new(self.clone(), &[Change::Chat], |store| {
            store.get_all_chat_messages()
        })
    }
}

/// A subscription-style read: an infinite sequence of query results that
/// yields the current result immediately and re-yields after every
/// committed write to a table the query depends on.
///
/// Each call to a `watch_*` method creates an independent subscriber.
/// Dropping the value unsubscribes; there is no other way a live query
/// ends. A subscriber that falls behind the change channel simply re-runs
/// its query, so it always converges on the committed state.
pub struct LiveQuery<T> {
    store: LedgerStore,
    changes: broadcast::Receiver<Change>,
    tables: &'static [Change],
    query: Box<dyn Fn(&LedgerStore) -> Result<T, Error> + Send + Sync>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    fn new(
        store: LedgerStore,
        tables: &'static [Change],
        query: impl Fn(&LedgerStore) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Self {
        // Subscribe before the first emission so writes between creation
        // and the first `next` call are not missed.
        let changes = store.changes.subscribe();

        Self {
            store,
            changes,
            tables,
            query: Box::new(query),
            primed: false,
        }
    }

    /// Wait for the next result. The first call resolves immediately with
    /// the current result; later calls resolve after the next relevant
    /// write.
    ///
    /// # Errors
    /// Returns an error if re-running the query against the store fails.
    pub async fn next(&mut self) -> Result<T, Error> {
        if !self.primed {
            self.primed = true;
            return (self.query)(&self.store);
        }

        loop {
            match self.changes.recv().await {
                Ok(change) if self.tables.contains(&change) => {
                    return (self.query)(&self.store);
                }
                Ok(_) => {}
                // Lagged (or, unreachable while we hold a store clone,
                // closed): missed notifications, so emit the current state.
                Err(_) => return (self.query)(&self.store),
            }
        }
    }
}


#[cfg(test)]
mod store_tests {
    use time::macros::date;

    use crate::{Error, account::Account, payment::Payment, purchase::Purchase};

    use super::LedgerStore;

    fn account_with_id(id: i64) -> Account {
        Account {
            id,
            ..Account::new("Ravi")
        }
    }

    #[test]
    fn duplicate_account_id_is_surfaced() {
        let store = LedgerStore::open_in_memory().unwrap();
        store.insert_account(&account_with_id(1)).unwrap();

        let result = store.insert_account(&account_with_id(1));

        assert_eq!(result, Err(Error::DuplicateId));
    }

    #[test]
    fn cascade_delete_removes_account_and_history() {
        let store = LedgerStore::open_in_memory().unwrap();
        let account = account_with_id(1);
        store.insert_account(&account).unwrap();
        store
            .record_purchase(&Purchase::new(
                &account,
                "Bread",
                25.0,
                date!(2025 - 01 - 10),
                100,
            ))
            .unwrap();
        store
            .record_payment(&Payment::new(&account, 10.0, date!(2025 - 01 - 11), 200))
            .unwrap();

        store.delete_account_and_data(account.id).unwrap();

        assert_eq!(store.get_account_by_id(account.id).unwrap(), None);
        assert!(store.get_purchases_for_account(account.id).unwrap().is_empty());
        assert!(store.get_payments_for_account(account.id).unwrap().is_empty());
    }

    #[test]
    fn restore_account_overwrites_local_row() {
        let store = LedgerStore::open_in_memory().unwrap();
        store.insert_account(&account_with_id(1)).unwrap();

        let remote = Account {
            name: "Ravi Kumar".to_owned(),
            remaining_balance: 42.0,
            ..account_with_id(1)
        };
        store.restore_account(&remote).unwrap();

        let account = store.get_account_by_id(1).unwrap().unwrap();
        assert_eq!(account.name, "Ravi Kumar");
        assert_eq!(account.remaining_balance, 42.0);
    }
}

#[cfg(test)]
mod live_query_tests {
    use time::macros::date;

    use crate::{account::Account, purchase::Purchase};

    use super::LedgerStore;

    fn account_with_id(id: i64, name: &str) -> Account {
        Account {
            id,
            ..Account::new(name)
        }
    }

    #[tokio::test]
    async fn watch_accounts_emits_current_state_first() {
        let store = LedgerStore::open_in_memory().unwrap();
        store.insert_account(&account_with_id(1, "Ravi")).unwrap();

        let mut live = store.watch_accounts();

        let accounts = live.next().await.unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[tokio::test]
    async fn watch_accounts_reemits_after_insert() {
        let store = LedgerStore::open_in_memory().unwrap();
        let mut live = store.watch_accounts();
        assert!(live.next().await.unwrap().is_empty());

        store.insert_account(&account_with_id(1, "Ravi")).unwrap();

        let accounts = live.next().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Ravi");
    }

    #[tokio::test]
    async fn watch_purchases_on_date_ignores_other_dates() {
        let store = LedgerStore::open_in_memory().unwrap();
        let account = account_with_id(1, "Ravi");
        store.insert_account(&account).unwrap();

        let mut live = store.watch_purchases_on_date(account.id, date!(2025 - 01 - 01));
        assert!(live.next().await.unwrap().is_empty());

        store
            .record_purchase(&Purchase::new(
                &account,
                "Milk",
                30.0,
                date!(2025 - 01 - 01),
                100,
            ))
            .unwrap();
        store
            .record_purchase(&Purchase::new(
                &account,
                "Bread",
                20.0,
                date!(2025 - 01 - 02),
                200,
            ))
            .unwrap();

        let on_first = live.next().await.unwrap();
        assert_eq!(on_first.len(), 1);
        assert_eq!(on_first[0].item_name, "Milk");
    }

    #[tokio::test]
    async fn each_subscriber_is_independent() {
        let store = LedgerStore::open_in_memory().unwrap();
        let mut first = store.watch_accounts();
        let mut second = store.watch_accounts();

        store.insert_account(&account_with_id(1, "Ravi")).unwrap();

        assert_eq!(first.next().await.unwrap().len(), 1);
        assert_eq!(second.next().await.unwrap().len(), 1);
    }
}
