//! Profile synchronization.
//!
//! - `identity` - Who is playing (token, username, profile id, role)
//! - `store` - Profile store trait and the HTTP backend client
//! - `memory` - In-process profile store
//! - `synchronizer` - Per-session reconciliation with the store
//! - `error` - Store errors

pub mod error;
pub mod identity;
pub mod memory;
pub mod store;
pub mod synchronizer;

pub use error::SyncError;
pub use identity::{Identity, ProfileId, Role, ROLE_CLAIM};
pub use memory::MemoryProfileStore;
pub use store::{HttpProfileStore, MergeFn, PlayerSummary, ProfileStore, DEFAULT_BASE_URL};
pub use synchronizer::{SkipReason, StatsSynchronizer, SyncOutcome, SyncSettings};
