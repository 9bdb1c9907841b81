use std::path::Path;

use rollcall_core::db::LibSqlGuestStore;
use rollcall_core::sync::{ResetStatus, SyncEngine};

use crate::commands::common::{open_database, open_remote};
use crate::error::CliError;

pub async fn run_reset(confirmed: bool, db_path: &Path) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ResetNotConfirmed);
    }

    let remote = open_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    println!("{}", ResetStatus::Resetting);
    let status = SyncEngine::new(&local, &remote).reset().await;
    drop(local);
    db.close();

    if matches!(status, ResetStatus::ResetFailed(_)) {
        return Err(CliError::ResetFailed(status.to_string()));
    }
    println!("{status}");
    Ok(())
}
