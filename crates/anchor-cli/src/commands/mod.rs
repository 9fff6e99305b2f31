pub mod anchor;
pub mod config;
pub mod ritual;
pub mod streak;
pub mod sync;
