//! Guest model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Guest identifier: the trimmed, lower-cased guest name.
///
/// Used as the primary key locally and as the document id remotely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Derive the identifier for a display name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        normalize_id(name)
    }

    /// Wrap an identifier that is already normalized (e.g. a remote document id).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank ids are never written to either replica.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive a guest id from a raw name.
///
/// Trims and lower-cases the name. A blank name gets a placeholder of the form
/// `guest-<unix millis>-<8 hex>`; the random suffix keeps placeholders created in
/// the same millisecond apart.
///
/// # Examples
///
/// ```
/// use rollcall_core::models::normalize_id;
///
/// assert_eq!(normalize_id("  Alice Smith ").as_str(), "alice smith");
/// assert!(normalize_id("   ").as_str().starts_with("guest-"));
/// ```
#[must_use]
pub fn normalize_id(name: &str) -> GuestId {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let random = Uuid::now_v7().simple().to_string();
        let suffix = &random[random.len() - 8..];
        return GuestId(format!("guest-{}-{suffix}", unix_millis_now()));
    }
    GuestId(trimmed.to_lowercase())
}

/// A registered guest.
///
/// Equality and hashing only look at `id`; use [`GuestRecord::fields_match`] to
/// compare every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRecord {
    pub id: GuestId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub company_name: String,
    #[serde(default)]
    pub attending: bool,
    #[serde(default)]
    pub has_lanyard: bool,
    #[serde(default)]
    pub has_gift: bool,
    #[serde(default)]
    pub has_food_coupon: bool,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Soft delete flag (tombstone) for sync
    #[serde(default)]
    pub deleted: bool,
}

impl GuestRecord {
    /// Create a guest with contact details and every flag cleared.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
        company_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: normalize_id(&name),
            name,
            email: email.into(),
            phone_number: phone_number.into(),
            company_name: company_name.into(),
            attending: false,
            has_lanyard: false,
            has_gift: false,
            has_food_coupon: false,
            remarks: None,
            payment_mode: None,
            amount: None,
            category: None,
            deleted: false,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Reject records whose display name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("guest name must not be blank".into()));
        }
        Ok(())
    }

    /// Copy of this record whose id is re-derived from its name.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            id: normalize_id(&self.name),
            ..self.clone()
        }
    }

    /// Copy of this record marked as a tombstone.
    #[must_use]
    pub fn tombstoned(&self) -> Self {
        Self {
            deleted: true,
            ..self.clone()
        }
    }

    /// Compare every field, not just the identity.
    #[must_use]
    pub fn fields_match(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.email == other.email
            && self.phone_number == other.phone_number
            && self.company_name == other.company_name
            && self.attending == other.attending
            && self.has_lanyard == other.has_lanyard
            && self.has_gift == other.has_gift
            && self.has_food_coupon == other.has_food_coupon
            && self.remarks == other.remarks
            && self.payment_mode == other.payment_mode
            && self.amount == other.amount
            && self.category == other.category
            && self.deleted == other.deleted
    }
}

impl PartialEq for GuestRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GuestRecord {}

impl Hash for GuestRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
