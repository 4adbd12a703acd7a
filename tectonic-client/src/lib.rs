//! # tectonic-client
//!
//! Client library for the tectonic tick database.
//!
//! This crate provides:
//! - Framed transport over TCP with partial-read accumulation
//! - A session type exposing the full command surface
//! - Bulk inserts as a bracketed multi-frame sequence
//! - A poll-based subscription feed

pub mod client;
pub mod connection;
pub mod error;
pub mod subscription;

pub use client::{BulkAddResult, Client};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use subscription::{PollResult, Subscription, DEFAULT_POLL_INTERVAL};
