//! Guest spreadsheet export and import helpers.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::gateway::MutationGateway;
use crate::models::GuestRecord;
use crate::remote::RemoteStore;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

pub const CSV_HEADER: [&str; 11] = [
    "Name",
    "Email",
    "Phone Number",
    "Company Name",
    "Category",
    "Amount",
    "Remarks",
    "Attendance",
    "Lanyard",
    "Gift",
    "Food Coupon",
];

/// Render live guests as pretty-printed JSON.
pub fn render_json_export(guests: &[GuestRecord]) -> serde_json::Result<String> {
    let live = guests
        .iter()
        .filter(|guest| !guest.deleted)
        .collect::<Vec<&GuestRecord>>();
    serde_json::to_string_pretty(&live)
}

/// Render live guests as a CSV sheet with a header row.
#[must_use]
pub fn render_csv_export(guests: &[GuestRecord]) -> String {
    let mut output = String::new();
    write_csv_row(&mut output, CSV_HEADER);

    for guest in guests.iter().filter(|guest| !guest.deleted) {
        write_csv_row(
            &mut output,
            [
                guest.name.as_str(),
                guest.email.as_str(),
                guest.phone_number.as_str(),
                guest.company_name.as_str(),
                guest.category.as_deref().unwrap_or_default(),
                guest.amount.as_deref().unwrap_or_default(),
                guest.remarks.as_deref().unwrap_or_default(),
                yes_no(guest.attending),
                yes_no(guest.has_lanyard),
                yes_no(guest.has_gift),
                yes_no(guest.has_food_coupon),
            ],
        );
    }

    output
}

/// Render guests based on selected export format.
pub fn render_guests_export(guests: &[GuestRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(render_json_export(guests)?),
        ExportFormat::Csv => Ok(render_csv_export(guests)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("rollcall-export-{timestamp_ms}.{}", format.extension())
}

const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn write_csv_row<'a>(output: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            output.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            let _ = write!(output, "\"{}\"", field.replace('"', "\"\""));
        } else {
            output.push_str(field);
        }
    }
    output.push_str("\r\n");
}

/// Split CSV text into rows of fields (RFC 4180 quoting).
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(Error::InvalidInput("unterminated quoted CSV field".into()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

/// Guests read from an import sheet.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub guests: Vec<GuestRecord>,
    /// Rows without a name
    pub skipped: usize,
}

/// Read an import sheet: a header row, then `name, phone, email, company`.
pub fn parse_guest_import(input: &str) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();

    for row in parse_csv(input)?.into_iter().skip(1) {
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let column = |index: usize| row.get(index).map_or("", |value| value.trim());
        if column(0).is_empty() {
            batch.skipped += 1;
            continue;
        }
        batch
            .guests
            .push(GuestRecord::new(column(0), column(2), column(1), column(3)));
    }

    Ok(batch)
}

/// Counts from an import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    /// Guests that already existed locally
    pub conflicts: usize,
    pub skipped: usize,
    /// Added locally but not mirrored remotely yet
    pub remote_failures: usize,
}

/// Add every imported guest through the gateway.
pub async fn import_guests<L: LocalStore, R: RemoteStore>(
    gateway: &MutationGateway<'_, L, R>,
    batch: &ImportBatch,
) -> Result<ImportReport> {
    let mut report = ImportReport {
        skipped: batch.skipped,
        ..ImportReport::default()
    };

    for guest in &batch.guests {
        match gateway.add(guest).await {
            Ok(mutation) => {
                report.added += 1;
                if !mutation.is_synced() {
                    report.remote_failures += 1;
                }
            }
            Err(Error::Conflict(name)) => {
                tracing::debug!("Skipping existing guest {name}");
                report.conflicts += 1;
            }
            Err(error) => return Err(error),
        }
    }

    tracing::info!(
        "Imported {} guests ({} existing, {} skipped)",
        report.added,
        report.conflicts,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlGuestStore};
    use crate::models::GuestId;
    use crate::remote::MemoryCollection;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_csv_export_quotes_and_flags() {
        let mut alice = GuestRecord::new("Alice, Jr.", "a@x.com", "555-1", "Acme \"Labs\"")
            .with_category("VIP");
        alice.attending = true;
        alice.has_gift = true;
        let removed = GuestRecord::new("bob", "", "", "").tombstoned();

        let rendered = render_csv_export(&[alice, removed]);
        let lines = rendered.split("\r\n").collect::<Vec<_>>();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(
            lines[1],
            "\"Alice, Jr.\",a@x.com,555-1,\"Acme \"\"Labs\"\"\",VIP,,,Yes,No,Yes,No"
        );
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "");
    }

    #[test]
    fn render_json_export_skips_tombstones() {
        let guests = [
            GuestRecord::new("alice", "", "", ""),
            GuestRecord::new("bob", "", "", "").tombstoned(),
        ];
        let rendered = render_json_export(&guests).unwrap();
        let parsed: Vec<GuestRecord> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(rendered.contains("\"phoneNumber\""));
    }

    #[test]
    fn parse_csv_handles_quotes_and_line_endings() {
        let rows = parse_csv("a,\"b,c\"\r\n\"say \"\"hi\"\"\",\"multi\nline\"\nlast,").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b,c".to_string()],
                vec!["say \"hi\"".to_string(), "multi\nline".to_string()],
                vec!["last".to_string(), String::new()],
            ]
        );
        assert!(parse_csv("\"open").is_err());
    }

    #[test]
    fn parse_guest_import_maps_columns_and_skips_blank_names() {
        let sheet = "\u{feff}Name,Phone,Email,Company\n\
                     Alice,555-1,a@x.com,Acme\n\
                     ,555-2,nobody@x.com,\n\
                     \n\
                     Bob\n";
        let batch = parse_guest_import(sheet).unwrap();

        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.guests.len(), 2);
        let alice = &batch.guests[0];
        assert_eq!(alice.id.as_str(), "alice");
        assert_eq!(alice.phone_number, "555-1");
        assert_eq!(alice.email, "a@x.com");
        assert_eq!(alice.company_name, "Acme");
        assert_eq!(batch.guests[1].email, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_guests_counts_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);
        gateway
            .add(&GuestRecord::new("alice", "", "", ""))
            .await
            .unwrap();

        let batch = parse_guest_import("name,phone,email,company\nALICE,,,\nbob,,,\n,,,x\n").unwrap();
        let report = import_guests(&gateway, &batch).await.unwrap();

        assert_eq!(
            report,
            ImportReport {
                added: 1,
                conflicts: 1,
                skipped: 1,
                remote_failures: 0,
            }
        );
        assert!(remote.document(&GuestId::from_raw("bob")).is_some());
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "rollcall-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Csv, 456),
            "rollcall-export-456.csv"
        );
    }
}
