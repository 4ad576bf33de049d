//! Spreadsheet export of an account's purchase history.
//!
//! Writes a CSV file covering an inclusive date range and records a
//! [Report] metadata row pointing at it.

use std::{fs, io, path::Path};

use time::Date;

use crate::{
    Error,
    account::Account,
    dates,
    report::{NewReport, Report},
    store::LedgerStore,
};

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|character| {
            if character.is_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect()
}

/// Export `account`'s purchases from `from` through `to` (both inclusive)
/// as a CSV file in `directory`, and record the report metadata row.
///
/// The file is named `{account}_{from}_{to}.csv`.
///
/// # Errors
/// Returns an error if the purchases cannot be read, the file cannot be
/// written, or the metadata row cannot be inserted.
pub fn export_purchases_csv(
    store: &LedgerStore,
    account: &Account,
    from: Date,
    to: Date,
    directory: &Path,
) -> Result<Report, Error> {
    let (start, end) = dates::day_range_millis(from, to);
    let purchases = store.get_purchases_in_range(account.id, start, end)?;

    let file_name = format!("{}_{from}_{to}.csv", file_safe(&account.name));
    let file_path = directory.join(&file_name);

    let mut writer = csv::Writer::from_path(&file_path)?;
    writer.write_record(["Item", "Amount", "Date"])?;
    for purchase in &purchases {
        writer.write_record([
            purchase.item_name.as_str(),
            &purchase.amount.to_string(),
            &dates::display_date(purchase.date),
        ])?;
    }
    writer.flush()?;

    tracing::info!(
        "exported {} purchases for account {} to {}",
        purchases.len(),
        account.id,
        file_path.display()
    );

    store.insert_report(NewReport {
        account_name: account.name.clone(),
        file_name,
        file_path: file_path.to_string_lossy().into_owned(),
        date_range: format!(
            "{} - {}",
            dates::display_date(from),
            dates::display_date(to)
        ),
        generated_on: dates::today(),
    })
}

/// Delete a report's metadata row and its file on disk. A file that has
/// already been removed out of band is tolerated.
///
/// # Errors
/// Returns an error if the row cannot be deleted or the file removal fails
/// for a reason other than the file being gone.
pub fn delete_report_and_file(store: &LedgerStore, report: &Report) -> Result<(), Error> {
    store.delete_report(report.id)?;

    match fs::remove_file(&report.file_path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(Error::from(error)),
    }
}

#[cfg(test)]
mod export_tests {
    use std::{fs, path::Path};

    use time::macros::date;

    use crate::{account::Account, dates, purchase::Purchase, store::LedgerStore};

    use super::{delete_report_and_file, export_purchases_csv, file_safe};

    fn store_with_history() -> (LedgerStore, Account) {
        let store = LedgerStore::open_in_memory().unwrap();
        let account = Account::new("Ravi Kumar");
        store.insert_account(&account).unwrap();

        for (item, amount, day) in [
            ("Rice", 50.0, date!(2025 - 01 - 05)),
            ("Oil", 120.0, date!(2025 - 01 - 20)),
            ("Sugar", 30.0, date!(2025 - 02 - 02)),
        ] {
            let timestamp = dates::start_of_day_millis(day) + 3_600_000;
            store
                .record_purchase(&Purchase::new(&account, item, amount, day, timestamp))
                .unwrap();
        }

        (store, account)
    }

    #[test]
    fn export_writes_only_purchases_in_range() {
        let (store, account) = store_with_history();
        let dir = tempfile::tempdir().unwrap();

        let report = export_purchases_csv(
            &store,
            &account,
            date!(2025 - 01 - 01),
            date!(2025 - 01 - 31),
            dir.path(),
        )
        .unwrap();

        let contents = fs::read_to_string(&report.file_path).unwrap();
        assert!(contents.contains("Rice"));
        assert!(contents.contains("Oil"));
        assert!(!contents.contains("Sugar"));
    }

    #[test]
    fn export_records_report_metadata() {
        let (store, account) = store_with_history();
        let dir = tempfile::tempdir().unwrap();

        let report = export_purchases_csv(
            &store,
            &account,
            date!(2025 - 01 - 01),
            date!(2025 - 01 - 31),
            dir.path(),
        )
        .unwrap();

        assert_eq!(report.account_name, "Ravi Kumar");
        assert_eq!(report.file_name, "Ravi_Kumar_2025-01-01_2025-01-31.csv");
        assert_eq!(report.date_range, "01 Jan, 2025 - 31 Jan, 2025");
        assert_eq!(store.get_all_reports().unwrap(), vec![report]);
    }

    #[test]
    fn delete_removes_row_and_file() {
        let (store, account) = store_with_history();
        let dir = tempfile::tempdir().unwrap();
        let report = export_purchases_csv(
            &store,
            &account,
            date!(2025 - 01 - 01),
            date!(2025 - 01 - 31),
            dir.path(),
        )
        .unwrap();

        delete_report_and_file(&store, &report).unwrap();

        assert!(store.get_all_reports().unwrap().is_empty());
        assert!(!Path::new(&report.file_path).exists());
    }

    #[test]
    fn delete_tolerates_missing_file() {
        let (store, account) = store_with_history();
        let dir = tempfile::tempdir().unwrap();
        let report = export_purchases_csv(
            &store,
            &account,
            date!(2025 - 01 - 01),
            date!(2025 - 01 - 31),
            dir.path(),
        )
        .unwrap();
        fs::remove_file(&report.file_path).unwrap();

        delete_report_and_file(&store, &report).unwrap();

        assert!(store.get_all_reports().unwrap().is_empty());
    }

    #[test]
    fn file_names_never_contain_separators() {
        assert_eq!(file_safe("Ravi Kumar"), "Ravi_Kumar");
        assert_eq!(file_safe("../etc"), "___etc");
    }
}
