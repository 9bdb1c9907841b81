use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::gateway::{Mutation, MutationGateway};
use rollcall_core::remote::RemoteStore;

use crate::commands::common::{
    find_guest, open_database, open_mutation_remote, print_mutation,
};
use crate::error::CliError;

pub async fn run_delete(name: &str, db_path: &Path) -> Result<(), CliError> {
    let remote = open_mutation_remote()?;
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());

    let result = delete_guest(&local, &remote, name).await;
    drop(local);
    db.close();

    print_mutation(&result?);
    Ok(())
}

pub async fn delete_guest<L: LocalStore, R: RemoteStore>(
    local: &L,
    remote: &R,
    name: &str,
) -> Result<Mutation, CliError> {
    let guest = find_guest(local, name).await?;
    Ok(MutationGateway::new(local, remote).delete(&guest).await?)
}
