//! Read-only guest roster projections (filters, counters, live view).

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::watch;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::GuestRecord;

/// Attendance filter for the roster list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttendanceFilter {
    #[default]
    All,
    Present,
    YetToAttend,
}

/// Category filter for the roster list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

/// Combined roster query; the default matches every live guest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterQuery {
    pub search: String,
    pub category: CategoryFilter,
    pub attendance: AttendanceFilter,
}

/// Apply category, attendance and name search filters in that order.
#[must_use]
pub fn filter_guests(guests: &[GuestRecord], query: &RosterQuery) -> Vec<GuestRecord> {
    let search = normalize_query(&query.search);
    let category = match &query.category {
        CategoryFilter::All => None,
        CategoryFilter::Only(category) => Some(normalize_query(category)),
    };

    guests
        .iter()
        .filter(|guest| guest_matches_category(guest, category.as_deref()))
        .filter(|guest| guest_matches_attendance(guest, query.attendance))
        .filter(|guest| guest_matches_search(guest, &search))
        .cloned()
        .collect()
}

fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn guest_matches_category(guest: &GuestRecord, category: Option<&str>) -> bool {
    let Some(category) = category else {
        return true;
    };
    guest
        .category
        .as_deref()
        .is_some_and(|value| normalize_query(value) == category)
}

const fn guest_matches_attendance(guest: &GuestRecord, filter: AttendanceFilter) -> bool {
    match filter {
        AttendanceFilter::All => true,
        AttendanceFilter::Present => guest.attending,
        AttendanceFilter::YetToAttend => !guest.attending,
    }
}

fn guest_matches_search(guest: &GuestRecord, search: &str) -> bool {
    search.is_empty() || guest.name.to_lowercase().contains(search)
}

/// Event-day counters over live guests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total: usize,
    pub attending: usize,
    pub yet_to_attend: usize,
    pub gifts: usize,
    pub food_coupons: usize,
    pub lanyards: usize,
    pub by_category: BTreeMap<String, usize>,
    pub uncategorized: usize,
}

impl RosterStats {
    /// Count the given guests; tombstones are skipped.
    #[must_use]
    pub fn from_guests(guests: &[GuestRecord]) -> Self {
        let mut stats = Self::default();
        for guest in guests.iter().filter(|guest| !guest.deleted) {
            stats.total += 1;
            if guest.attending {
                stats.attending += 1;
            } else {
                stats.yet_to_attend += 1;
            }
            stats.gifts += usize::from(guest.has_gift);
            stats.food_coupons += usize::from(guest.has_food_coupon);
            stats.lanyards += usize::from(guest.has_lanyard);

            match guest
                .category
                .as_deref()
                .map(str::trim)
                .filter(|category| !category.is_empty())
            {
                Some(category) => *stats.by_category.entry(category.to_string()).or_default() += 1,
                None => stats.uncategorized += 1,
            }
        }
        stats
    }
}

/// Filtered guests sorted by name, with counters over the whole roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub guests: Vec<GuestRecord>,
    pub stats: RosterStats,
}

impl RosterSnapshot {
    #[must_use]
    pub fn build(all: &[GuestRecord], query: &RosterQuery) -> Self {
        let mut guests = filter_guests(all, query);
        guests.retain(|guest| !guest.deleted);
        guests.sort_by(|left, right| {
            left.name
                .to_lowercase()
                .cmp(&right.name.to_lowercase())
                .then_with(|| left.id.cmp(&right.id))
        });
        Self {
            guests,
            stats: RosterStats::from_guests(all),
        }
    }

    /// Names of every category in use, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.stats.by_category.keys().map(String::as_str)
    }
}

/// Roster view that refreshes after every local write.
pub struct LiveRoster<'a, L> {
    store: &'a L,
    changes: watch::Receiver<u64>,
    query: RosterQuery,
}

impl<'a, L: LocalStore> LiveRoster<'a, L> {
    pub fn new(store: &'a L, query: RosterQuery) -> Self {
        let mut changes = store.changes();
        changes.mark_unchanged();
        Self {
            store,
            changes,
            query,
        }
    }

    pub fn set_query(&mut self, query: RosterQuery) {
        self.query = query;
    }

    /// Snapshot of the store as it is now.
    pub async fn current(&self) -> Result<RosterSnapshot> {
        let guests = self.store.get_all().await?;
        Ok(RosterSnapshot::build(&guests, &self.query))
    }

    /// Wait for the next local write and return the refreshed snapshot.
    ///
    /// Writes that land while a snapshot is being built coalesce into one
    /// refresh. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Result<RosterSnapshot>> {
        self.changes.changed().await.ok()?;
        self.changes.mark_unchanged();
        Some(self.current().await)
    }
}
