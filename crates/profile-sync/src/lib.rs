//! Profile Sync - debounced uploads of app user profile changes.
//!
//! This crate coalesces profile edits made on the client and uploads them to the
//! app user API at most once per configured interval. Every call returns an
//! [`UpdateOutcome`] that resolves with the refreshed user once the coalesced
//! upload has completed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use profile_sync::{
//!     AppConfig, AppUser, HttpProfileClient, InMemoryUserStore, ProfileUpdater, UserProps,
//!     UserState,
//! };
//!
//! let store = Arc::new(InMemoryUserStore::new(UserState::new(config, AppUser::with_id("u1"))));
//! let client = Arc::new(HttpProfileClient::from_env()?);
//! let updater = ProfileUpdater::with_system_clock(store, client);
//!
//! let user = updater.update(UserProps::new().given_name("Ada")).await?;
//! ```

mod client;
mod clock;
mod config;
mod error;
mod outcome;
mod store;
mod types;
mod updater;

pub use client::{HttpProfileClient, ProfileClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ClientConfig, ProfileConfig, DEFAULT_API_URL};
pub use error::{ProfileSyncError, Result};
pub use outcome::{UpdateOutcome, UpdateResult};
pub use store::{InMemoryUserStore, UserAction, UserState, UserStore};
pub use types::*;
pub use updater::ProfileUpdater;
