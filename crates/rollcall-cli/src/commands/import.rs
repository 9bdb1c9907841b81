use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::export::{import_guests, parse_guest_import, ImportReport};
use rollcall_core::gateway::MutationGateway;
use rollcall_core::remote::RemoteStore;
use rollcall_core::sync::SyncStatus;

use crate::commands::common::{open_database, open_remote};
use crate::commands::sync::sync_once;
use crate::error::CliError;

pub async fn run_import(path: &Path, db_path: &Path) -> Result<(), CliError> {
    let sheet = std::fs::read_to_string(path)?;
    let remote = open_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = import_and_sync(&local, &remote, &sheet).await;
    drop(local);
    db.close();

    println!("{}", result?);
    Ok(())
}

async fn import_and_sync<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    sheet: &str,
) -> Result<SyncStatus, CliError> {
    let report = import_sheet(local, remote, sheet).await?;
    println!(
        "Imported {} guests ({} already present, {} rows without a name)",
        report.added, report.conflicts, report.skipped
    );
    sync_once(local, remote).await
}

pub async fn import_sheet<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    sheet: &str,
) -> Result<ImportReport, CliError> {
    let batch = parse_guest_import(sheet)?;
    let gateway = MutationGateway::new(local, remote);
    Ok(import_guests(&gateway, &batch).await?)
}
