use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::roster::{RosterQuery, RosterSnapshot};

use crate::cli::RosterFilterArgs;
use crate::commands::common::{
    format_guest_lines, guest_to_list_item, open_database, roster_query, GuestListItem,
};
use crate::error::CliError;

pub async fn run_list(
    filter: &RosterFilterArgs,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());
    let result = load_roster(&local, &roster_query(filter)).await;
    drop(local);
    db.close();
    let snapshot = result?;

    if as_json {
        let json_items = snapshot
            .guests
            .iter()
            .map(guest_to_list_item)
            .collect::<Vec<GuestListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_guest_lines(&snapshot.guests) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn load_roster<L: LocalStore>(
    local: &L,
    query: &RosterQuery,
) -> Result<RosterSnapshot, CliError> {
    let guests = local.get_all().await?;
    Ok(RosterSnapshot::build(&guests, query))
}
