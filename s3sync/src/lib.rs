pub mod actions;
pub mod config;
pub mod format;
pub mod listing;
pub mod sync;
