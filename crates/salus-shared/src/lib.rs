//! # salus-shared
//!
//! Types and constants shared across the Salus messaging core: actor roles,
//! the discriminated upload attribution, the resolved session identity, and
//! the media-type whitelist for attachments.
//!
//! This crate deliberately knows nothing about storage or transport; it only
//! describes the vocabulary the other crates speak.

pub mod constants;
pub mod types;

pub use types::{ActorRef, ActorRole, MediaType, SessionContext};
