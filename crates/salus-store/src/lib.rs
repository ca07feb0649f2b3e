//! # salus-store
//!
//! Durable relational store for the Salus messaging core, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for the three
//! persisted models: messages, notifications, and attachment metadata.
//! Callers living on the async side wrap the handle in a mutex; every
//! mutating helper here is a single statement, so the lock is held briefly.

pub mod attachments;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
