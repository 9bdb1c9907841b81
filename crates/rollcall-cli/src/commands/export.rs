use std::path::Path;

use rollcall_core::db::{LibSqlGuestStore, LocalStore};
use rollcall_core::export::{render_guests_export, ExportFormat as GuestExportFormat};

use crate::cli::ExportFormat;
use crate::commands::common::{open_database, write_output};
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let local = LibSqlGuestStore::new(db.connection());
    let result = local.get_all().await;
    drop(local);
    db.close();

    let rendered = render_guests_export(&result?, export_format(format))?;
    write_output(output_path, rendered.as_bytes())
}

pub const fn export_format(format: ExportFormat) -> GuestExportFormat {
    match format {
        ExportFormat::Json => GuestExportFormat::Json,
        ExportFormat::Csv => GuestExportFormat::Csv,
    }
}
