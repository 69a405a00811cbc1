//! SQLite persistence for the timetable.
//!
//! A single connection lives on a dedicated worker thread; repositories add
//! `impl Database` blocks that ship closures to it.

mod connection;
mod helpers;
mod migrations;
mod repositories;

pub use connection::Database;
