//! Data models for Rollcall

mod guest;

pub use guest::{normalize_id, GuestId, GuestRecord};
