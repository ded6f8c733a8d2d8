// ABOUTME: Library module for relational-migrator
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod interactive;
pub mod migration;
pub mod mysql;
pub mod orchestrator;
pub mod postgres;
pub mod sqlite;
pub mod utils;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MigrationError;
