use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::roster::RosterStats;

use crate::commands::common::{format_stats_lines, open_database};
use crate::error::CliError;

pub async fn run_stats(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());
    let result = local.get_all().await;
    drop(local);
    db.close();
    let stats = RosterStats::from_guests(&result?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }

    Ok(())
}
