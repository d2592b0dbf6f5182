pub mod config;
pub mod db;
pub mod feed;
pub mod locale;
pub mod media;
pub mod migrate;
pub mod model;
pub mod payload;
pub mod slug;
pub mod store;
pub mod sync;
