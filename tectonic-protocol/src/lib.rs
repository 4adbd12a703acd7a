//! # tectonic-protocol
//!
//! Wire protocol for talking to a tectonic tick-data server.
//!
//! This crate provides:
//! - The fixed 9-byte response header (success flag + big-endian body length)
//! - Newline-terminated command encoding
//! - The typed command vocabulary with its text serialization
//! - The positional tick row (`Update`) shared by insert and bulk commands

pub mod command;
pub mod error;
pub mod frame;
pub mod update;

pub use command::Command;
pub use error::ProtocolError;
pub use frame::{encode_command, Response, ResponseHeader, HEADER_SIZE, POLL_NONE};
pub use update::Update;

/// Default host for a tectonic server.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port for a tectonic server.
pub const DEFAULT_PORT: u16 = 9001;

/// Default database created by the server on startup.
pub const DEFAULT_DB: &str = "default";
