//! SQLite pool helpers for the shared store

pub mod init;

pub use init::*;
