use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::gateway::{Mutation, MutationGateway};
use rollcall_core::remote::RemoteStore;

use crate::cli::{GuestDetails, GuestFlags};
use crate::commands::common::{
    apply_details, apply_flags, find_guest, open_database, open_mutation_remote, print_mutation,
};
use crate::error::CliError;

pub async fn run_update(
    name: &str,
    details: &GuestDetails,
    flags: GuestFlags,
    db_path: &Path,
) -> Result<(), CliError> {
    let remote = open_mutation_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = update_guest(&local, &remote, name, details, flags).await;
    drop(local);
    db.close();

    print_mutation(&result?);
    Ok(())
}

pub async fn run_check_in(name: &str, db_path: &Path) -> Result<(), CliError> {
    let flags = GuestFlags {
        attending: Some(true),
        ..GuestFlags::default()
    };
    run_update(name, &GuestDetails::default(), flags, db_path).await
}

pub async fn update_guest<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    name: &str,
    details: &GuestDetails,
    flags: GuestFlags,
) -> Result<Mutation, CliError> {
    let mut guest = find_guest(local, name).await?;
    apply_details(&mut guest, details);
    apply_flags(&mut guest, flags);

    Ok(MutationGateway::new(local, remote).update(&guest).await?)
}
