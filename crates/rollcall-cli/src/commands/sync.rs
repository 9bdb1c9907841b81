use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::remote::RemoteStore;
use rollcall_core::sync::{SyncEngine, SyncStatus};

use crate::commands::common::{open_database, open_remote};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let remote = open_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = sync_once(&local, &remote).await;
    drop(local);
    db.close();

    println!("{}", result?);
    Ok(())
}

pub async fn sync_once<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
) -> Result<SyncStatus, CliError> {
    let status = SyncEngine::new(local, remote).sync().await;
    if matches!(status, SyncStatus::SyncFailed(_)) {
        return Err(CliError::SyncFailed(status.to_string()));
    }
    Ok(status)
}
