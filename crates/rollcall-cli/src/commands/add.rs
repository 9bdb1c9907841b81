use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::gateway::{Mutation, MutationGateway};
use rollcall_core::remote::RemoteStore;
use rollcall_core::GuestRecord;

use crate::cli::GuestDetails;
use crate::commands::common::{
    apply_details, normalize_guest_name, open_database, open_mutation_remote, print_mutation,
};
use crate::error::CliError;

pub async fn run_add(name: &str, details: &GuestDetails, db_path: &Path) -> Result<(), CliError> {
    let remote = open_mutation_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = add_guest(&local, &remote, name, details).await;
    drop(local);
    db.close();

    print_mutation(&result?);
    Ok(())
}

pub async fn add_guest<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    name: &str,
    details: &GuestDetails,
) -> Result<Mutation, CliError> {
    let name = normalize_guest_name(name)?;
    let mut guest = GuestRecord::new(name, "", "", "");
    apply_details(&mut guest, details);

    Ok(MutationGateway::new(local, remote).add(&guest).await?)
}
