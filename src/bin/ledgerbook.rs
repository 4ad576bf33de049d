use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use time::{Date, macros::format_description};
use tracing_subscriber::EnvFilter;

use ledgerbook::{
    Account, AppState, Error, LedgerStore, Payment, Purchase, Session, SyncManager,
    assistant::{ChatAssistant, HttpTextCompletion},
    dates, export,
    remote::{HttpBlobStore, HttpDocumentStore, StaticIdentity},
};

/// A personal credit ledger with best-effort remote backup.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, default_value = "ledger.db")]
    db_path: PathBuf,

    /// File path to the persisted session file.
    #[arg(long, default_value = "session.json")]
    session_path: PathBuf,

    /// Base URL of the remote backup service.
    #[arg(long, default_value = "http://localhost:8080")]
    remote_url: String,

    /// API key for the remote backup service.
    #[arg(long)]
    remote_key: Option<String>,

    /// Remote user id. Without it every sync operation is skipped.
    #[arg(long)]
    user_id: Option<String>,

    /// URL of the text-completion endpoint used by `ask`.
    #[arg(long, default_value = "http://localhost:8081/complete")]
    assistant_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new account.
    AddAccount {
        /// The account holder's name.
        name: String,
        /// An email address linked to the account.
        #[arg(long)]
        email: Option<String>,
        /// An opening deposit amount.
        #[arg(long)]
        deposit: Option<f64>,
    },
    /// List all accounts with their balances.
    Accounts,
    /// Show an account's purchase and payment history.
    History {
        /// The account id.
        account_id: i64,
    },
    /// Record a purchase on credit.
    Purchase {
        /// The account id.
        account_id: i64,
        /// What was bought.
        item: String,
        /// The purchase amount.
        amount: f64,
        /// The purchase date (YYYY-MM-DD), defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },
    /// Record a payment against an account's balance.
    Pay {
        /// The account id.
        account_id: i64,
        /// The payment amount.
        amount: f64,
        /// The payment date (YYYY-MM-DD), defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },
    /// Delete an account and its entire history.
    DeleteAccount {
        /// The account id.
        account_id: i64,
    },
    /// Export an account's purchases in a date range to a CSV file.
    Export {
        /// The account id.
        account_id: i64,
        /// First day of the range (YYYY-MM-DD).
        #[arg(value_parser = parse_date)]
        from: Date,
        /// Last day of the range (YYYY-MM-DD), inclusive.
        #[arg(value_parser = parse_date)]
        to: Date,
        /// Directory to write the file into.
        #[arg(long, default_value = ".")]
        directory: PathBuf,
    },
    /// List generated reports.
    Reports,
    /// Delete a report and its file.
    DeleteReport {
        /// The report id.
        report_id: i64,
    },
    /// Save the signed-in user and pull the remote backup into the local
    /// store.
    Login {
        /// The user's email address.
        email: String,
        /// The user's password.
        password: String,
    },
    /// Clear the session, keeping only the theme preference.
    Logout,
    /// Pull the remote backup into the local store.
    Restore,
    /// Ask the assistant a question about the ledger.
    Ask {
        /// The question to ask.
        question: String,
    },
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("expected a date like 2025-01-31: {error}"))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_logging();

    let args = Args::parse();

    let store = LedgerStore::open(&args.db_path)?;
    let session = Arc::new(Session::load(args.session_path.clone())?);
    let sync = Arc::new(SyncManager::new(
        store.clone(),
        Arc::new(StaticIdentity::new(args.user_id.clone())),
        Arc::new(HttpDocumentStore::new(
            &args.remote_url,
            args.remote_key.clone(),
        )),
        Arc::new(HttpBlobStore::new(&args.remote_url, args.remote_key.clone())),
    ));
    let assistant = ChatAssistant::new(
        store.clone(),
        Arc::new(HttpTextCompletion::new(&args.assistant_url, None)),
    );
    let state = AppState::new(store, session, sync, assistant);

    run(args.command, &state).await
}

async fn run(command: Command, state: &AppState) -> Result<(), Error> {
    match command {
        Command::AddAccount {
            name,
            email,
            deposit,
        } => {
            let account = Account {
                linked_email: email,
                deposit,
                ..Account::new(&name)
            };
            state.store.insert_account(&account)?;
            state.sync.upload_account(&account).await;
            println!("created account {} ({})", account.id, account.name);
        }
        Command::Accounts => {
            for account in state.store.get_all_accounts()? {
                println!(
                    "{:>12}  {:<24} balance {:>10.2}  deposit {:>10.2}  purchases {}",
                    account.id,
                    account.name,
                    account.remaining_balance,
                    account.deposit.unwrap_or(0.0),
                    account.purchase_count,
                );
            }
        }
        Command::History { account_id } => {
            for purchase in state.store.get_purchases_for_account(account_id)? {
                println!(
                    "{}  bought {:<24} {:>10.2}",
                    dates::display_date(purchase.date),
                    purchase.item_name,
                    purchase.amount,
                );
            }
            for payment in state.store.get_payments_for_account(account_id)? {
                println!(
                    "{}  paid   {:<24} {:>10.2}",
                    dates::display_date(payment.date),
                    payment.month,
                    payment.amount,
                );
            }
        }
        Command::Purchase {
            account_id,
            item,
            amount,
            date,
        } => {
            let account = require_account(state, account_id)?;
            let purchase = Purchase::new(
                &account,
                &item,
                amount,
                date.unwrap_or_else(dates::today),
                dates::now_millis(),
            );
            state.store.record_purchase(&purchase)?;
            state.sync.upload_purchase(&purchase).await;
            push_updated_account(state, account_id).await?;
            println!("recorded purchase {} for account {account_id}", purchase.id);
        }
        Command::Pay {
            account_id,
            amount,
            date,
        } => {
            let account = require_account(state, account_id)?;
            let payment = Payment::new(
                &account,
                amount,
                date.unwrap_or_else(dates::today),
                dates::now_millis(),
            );
            state.store.record_payment(&payment)?;
            state.sync.upload_payment(&payment).await;
            push_updated_account(state, account_id).await?;
            println!("recorded payment {} for account {account_id}", payment.id);
        }
        Command::DeleteAccount { account_id } => {
            state.store.delete_account_and_data(account_id)?;
            state.sync.delete_remote_account(account_id).await;
            println!("deleted account {account_id} and its history");
        }
        Command::Export {
            account_id,
            from,
            to,
            directory,
        } => {
            let account = require_account(state, account_id)?;
            let report = export::export_purchases_csv(&state.store, &account, from, to, &directory)?;
            println!("wrote {}", report.file_path);
        }
        Command::Reports => {
            for report in state.store.get_all_reports()? {
                println!(
                    "{:>6}  {:<40} {}",
                    report.id, report.file_name, report.date_range
                );
            }
        }
        Command::DeleteReport { report_id } => {
            let report = state
                .store
                .get_all_reports()?
                .into_iter()
                .find(|report| report.id == report_id)
                .ok_or(Error::NotFound)?;
            export::delete_report_and_file(&state.store, &report)?;
            println!("deleted report {report_id}");
        }
        Command::Login { email, password } => {
            state.session.save_user(&email, &password)?;
            state.session.set_logged_in(true)?;
            let summary = state.sync.restore_from_remote().await;
            println!(
                "logged in as {}; restored {} accounts, {} purchases, {} payments",
                state.session.display_name(),
                summary.accounts,
                summary.purchases,
                summary.payments,
            );
        }
        Command::Logout => {
            state.session.logout()?;
            println!("logged out");
        }
        Command::Restore => {
            let summary = state.sync.restore_from_remote().await;
            println!(
                "restored {} accounts, {} purchases, {} payments",
                summary.accounts, summary.purchases, summary.payments,
            );
        }
        Command::Ask { question } => {
            let answer = state.assistant.ask(&question).await?;
            println!("{}", answer.text);
        }
    }

    Ok(())
}

fn require_account(state: &AppState, account_id: i64) -> Result<Account, Error> {
    state
        .store
        .get_account_by_id(account_id)?
        .ok_or(Error::NotFound)
}

// Counters on the account change with every purchase and payment, so the
// remote copy of the account is refreshed after each one.
async fn push_updated_account(state: &AppState, account_id: i64) -> Result<(), Error> {
    if let Some(account) = state.store.get_account_by_id(account_id)? {
        state.sync.upload_account(&account).await;
    }

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
