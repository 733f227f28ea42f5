//! Live task list client library.

pub mod board;
pub mod config;
pub mod console;
pub mod identity;
pub mod profile;
pub mod store;
pub mod tasks;
