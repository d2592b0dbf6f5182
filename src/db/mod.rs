//! Local SQLite persistence.
//!
//! - `model`: shapes of the entries kept in the local news list.
//! - `repo`: pool setup, migrations and the key/value table behind
//!   [`LocalCache`].
//!
//! The local list lives under a single key as a JSON array, the same layout
//! the legacy browser build kept in `localStorage`.

pub mod model;
pub mod repo;

pub use model::{CachedNews, LegacyNews};
pub use repo::*;
