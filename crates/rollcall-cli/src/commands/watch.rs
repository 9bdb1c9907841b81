use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::remote::RemoteStore;
use rollcall_core::roster::{LiveRoster, RosterQuery, RosterSnapshot};
use rollcall_core::sync::SyncEngine;

use crate::cli::RosterFilterArgs;
use crate::commands::common::{
    format_guest_lines, now_label, open_database, open_remote, roster_query,
};
use crate::error::CliError;

pub async fn run_watch(filter: &RosterFilterArgs, db_path: &Path) -> Result<(), CliError> {
    let remote = open_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = watch_roster(&local, &remote, roster_query(filter)).await;
    drop(local);
    db.close();
    result
}

async fn watch_roster<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    query: RosterQuery,
) -> Result<(), CliError> {
    let engine = SyncEngine::new(local, remote);
    let mut roster = LiveRoster::new(local, query);

    print_snapshot(&roster.current().await?);
    eprintln!("Watching for remote changes. Press Ctrl-C to stop.");

    let realtime = engine.run_realtime(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    tokio::pin!(realtime);

    loop {
        tokio::select! {
            result = &mut realtime => return result.map_err(CliError::from),
            snapshot = roster.next() => match snapshot {
                Some(snapshot) => print_snapshot(&snapshot?),
                None => return Ok(()),
            },
        }
    }
}

fn print_snapshot(snapshot: &RosterSnapshot) {
    println!(
        "--- {}  {} guests, {} attending ---",
        now_label(),
        snapshot.stats.total,
        snapshot.stats.attending
    );
    for line in format_guest_lines(&snapshot.guests) {
        println!("{line}");
    }
}
