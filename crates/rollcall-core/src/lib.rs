//! rollcall-core - Core library for Rollcall
//!
//! This crate contains the guest model, the local libSQL store, the remote
//! collection adapters and the sync engine shared by every Rollcall interface.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod gateway;
pub mod models;
pub mod remote;
pub mod roster;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{GuestId, GuestRecord};
