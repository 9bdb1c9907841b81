use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rollcall_core::db::{Database, LocalStore};
use rollcall_core::gateway::Mutation;
use rollcall_core::remote::{FirestoreCollection, RemoteStore, Subscription};
use rollcall_core::roster::{AttendanceFilter, CategoryFilter, RosterQuery, RosterStats};
use rollcall_core::util::normalize_text_option;
use rollcall_core::{Error as CoreError, GuestId, GuestRecord};
use serde::Serialize;

use crate::cli::{Attendance, GuestDetails, GuestFlags, RosterFilterArgs};
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct GuestListItem {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub company_name: String,
    pub category: Option<String>,
    pub attending: bool,
    pub has_lanyard: bool,
    pub has_gift: bool,
    pub has_food_coupon: bool,
}

pub fn guest_to_list_item(guest: &GuestRecord) -> GuestListItem {
    GuestListItem {
        id: guest.id.to_string(),
        name: guest.name.clone(),
        email: guest.email.clone(),
        phone_number: guest.phone_number.clone(),
        company_name: guest.company_name.clone(),
        category: guest.category.clone(),
        attending: guest.attending,
        has_lanyard: guest.has_lanyard,
        has_gift: guest.has_gift,
        has_food_coupon: guest.has_food_coupon,
    }
}

pub fn format_guest_lines(guests: &[GuestRecord]) -> Vec<String> {
    guests
        .iter()
        .map(|guest| {
            let name = truncate(&guest.name, 28);
            let category = guest.category.as_deref().unwrap_or("-");
            let marks = format!(
                "{}{}{}{}",
                if guest.attending { 'A' } else { '.' },
                if guest.has_lanyard { 'L' } else { '.' },
                if guest.has_gift { 'G' } else { '.' },
                if guest.has_food_coupon { 'F' } else { '.' },
            );

            if guest.company_name.is_empty() {
                format!("{marks}  {name:<28}  {category}")
            } else {
                format!("{marks}  {name:<28}  {category:<12}  {}", guest.company_name)
            }
        })
        .collect()
}

pub fn format_stats_lines(stats: &RosterStats) -> Vec<String> {
    let mut lines = vec![
        format!("Total:          {}", stats.total),
        format!("Attending:      {}", stats.attending),
        format!("Yet to attend:  {}", stats.yet_to_attend),
        format!("Lanyards:       {}", stats.lanyards),
        format!("Gifts:          {}", stats.gifts),
        format!("Food coupons:   {}", stats.food_coupons),
    ];
    for (category, count) in &stats.by_category {
        lines.push(format!("  {category}: {count}"));
    }
    if stats.uncategorized > 0 {
        lines.push(format!("  (uncategorized): {}", stats.uncategorized));
    }
    lines
}

pub fn format_roster_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn now_label() -> String {
    format_roster_timestamp(Utc::now().timestamp_millis())
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn roster_query(filter: &RosterFilterArgs) -> RosterQuery {
    RosterQuery {
        search: filter.search.clone().unwrap_or_default(),
        category: normalize_text_option(filter.category.clone())
            .map_or(CategoryFilter::All, CategoryFilter::Only),
        attendance: match filter.attendance {
            Attendance::All => AttendanceFilter::All,
            Attendance::Present => AttendanceFilter::Present,
            Attendance::YetToAttend => AttendanceFilter::YetToAttend,
        },
    }
}

pub fn normalize_guest_name(name: &str) -> Result<String, CliError> {
    normalize_text_option(Some(name.to_string())).ok_or(CliError::EmptyGuestName)
}

/// Overwrite the fields that were given on the command line.
pub fn apply_details(guest: &mut GuestRecord, details: &GuestDetails) {
    let details = details.clone();
    if let Some(email) = details.email {
        guest.email = email.trim().to_string();
    }
    if let Some(phone) = details.phone {
        guest.phone_number = phone.trim().to_string();
    }
    if let Some(company) = details.company {
        guest.company_name = company.trim().to_string();
    }
    if details.category.is_some() {
        guest.category = normalize_text_option(details.category);
    }
    if details.amount.is_some() {
        guest.amount = normalize_text_option(details.amount);
    }
    if details.payment_mode.is_some() {
        guest.payment_mode = normalize_text_option(details.payment_mode);
    }
    if details.remarks.is_some() {
        guest.remarks = normalize_text_option(details.remarks);
    }
}

pub fn apply_flags(guest: &mut GuestRecord, flags: GuestFlags) {
    if let Some(attending) = flags.attending {
        guest.attending = attending;
    }
    if let Some(lanyard) = flags.lanyard {
        guest.has_lanyard = lanyard;
    }
    if let Some(gift) = flags.gift {
        guest.has_gift = gift;
    }
    if let Some(food_coupon) = flags.food_coupon {
        guest.has_food_coupon = food_coupon;
    }
}

/// Find a live guest by display name or raw id.
pub async fn find_guest<L: LocalStore>(store: &L, query: &str) -> Result<GuestRecord, CliError> {
    let name = normalize_guest_name(query)?;
    for id in [GuestId::from_name(&name), GuestId::from_raw(name.as_str())] {
        if let Some(guest) = store.get_by_id(&id).await? {
            if !guest.deleted {
                return Ok(guest);
            }
        }
    }
    Err(CliError::GuestNotFound(name))
}

pub fn print_mutation(mutation: &Mutation) {
    println!("{}", mutation.record.id);
    if !mutation.is_synced() {
        eprintln!("{}", mutation.status());
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("ROLLCALL_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rollcall")
        .join("rollcall.db")
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path).await?)
}

pub fn open_remote() -> Result<FirestoreCollection, CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let remote = config.effective_remote();
    if !remote.is_configured() {
        return Err(CliError::RemoteNotConfigured);
    }

    tracing::debug!(
        "Using collection {} in project {}",
        remote.collection(),
        remote.project_id()
    );
    Ok(FirestoreCollection::new(&remote)?)
}

/// Remote for single-guest mutations. Without a configured collection the
/// local write still commits and every remote call reports the collection as
/// unavailable.
pub enum MutationRemote {
    Firestore(FirestoreCollection),
    Offline,
}

impl MutationRemote {
    fn unavailable() -> CoreError {
        CoreError::RemoteUnavailable("remote collection is not configured".to_string())
    }
}

impl RemoteStore for MutationRemote {
    async fn fetch_all(&self) -> rollcall_core::Result<Vec<GuestRecord>> {
        match self {
            Self::Firestore(remote) => remote.fetch_all().await,
            Self::Offline => Err(Self::unavailable()),
        }
    }

    async fn batch_upsert(&self, records: &[GuestRecord]) -> rollcall_core::Result<()> {
        match self {
            Self::Firestore(remote) => remote.batch_upsert(records).await,
            Self::Offline => Err(Self::unavailable()),
        }
    }

    async fn batch_delete(&self, ids: &[GuestId]) -> rollcall_core::Result<()> {
        match self {
            Self::Firestore(remote) => remote.batch_delete(ids).await,
            Self::Offline => Err(Self::unavailable()),
        }
    }

    async fn subscribe(&self) -> rollcall_core::Result<Subscription> {
        match self {
            Self::Firestore(remote) => remote.subscribe().await,
            Self::Offline => Err(Self::unavailable()),
        }
    }
}

pub fn open_mutation_remote() -> Result<MutationRemote, CliError> {
    match open_remote() {
        Ok(remote) => Ok(MutationRemote::Firestore(remote)),
        Err(CliError::RemoteNotConfigured) => {
            tracing::debug!("No remote collection configured, saving locally only");
            Ok(MutationRemote::Offline)
        }
        Err(error) => Err(error),
    }
}

/// Write to `path` and print it, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, contents: &[u8]) -> Result<(), CliError> {
    match path {
        Some(path) => {
            fs::write(path, contents)?;
            println!("{}", path.display());
        }
        None => io::stdout().write_all(contents)?,
    }
    Ok(())
}
