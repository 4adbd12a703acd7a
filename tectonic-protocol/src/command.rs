//! Command vocabulary.
//!
//! Every command the client can send, with its text serialization kept in
//! one place so it can be tested without a socket.

use crate::frame::encode_command;
use crate::update::Update;
use bytes::BytesMut;
use std::fmt;

/// Commands understood by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Info,
    Ping,
    Help,
    CountAll,
    CountAllInMem,
    Create(String),
    Use(String),
    Clear,
    ClearAll,
    Flush,
    FlushAll,
    /// Insert one row into a named database.
    Insert { update: Update, db: String },
    /// Insert one row into the database currently in use.
    Add(Update),
    /// Opens a bulk insert. Rows follow as `BulkRow`, closed by `BulkEnd`.
    BulkAdd,
    BulkRow(Update),
    BulkEnd,
    GetAllJson,
    GetJson(u64),
    GetRangeCsv { start: u64, finish: u64 },
    Subscribe(String),
    Unsubscribe,
    /// The empty command, asking a subscribed session for its next event.
    Poll,
}

impl Command {
    /// Returns the command verb, for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Info => "INFO",
            Command::Ping => "PING",
            Command::Help => "HELP",
            Command::CountAll => "COUNT ALL",
            Command::CountAllInMem => "COUNT ALL IN MEM",
            Command::Create(_) => "CREATE",
            Command::Use(_) => "USE",
            Command::Clear => "CLEAR",
            Command::ClearAll => "CLEAR ALL",
            Command::Flush => "FLUSH",
            Command::FlushAll => "FLUSH ALL",
            Command::Insert { .. } => "INSERT",
            Command::Add(_) => "ADD",
            Command::BulkAdd => "BULKADD",
            Command::BulkRow(_) => "ROW",
            Command::BulkEnd => "DDAKLUB",
            Command::GetAllJson => "GET ALL",
            Command::GetJson(_) => "GET",
            Command::GetRangeCsv { .. } => "GET RANGE",
            Command::Subscribe(_) => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Poll => "POLL",
        }
    }

    /// Encodes the command as a newline-terminated frame.
    pub fn encode(&self) -> BytesMut {
        encode_command(&self.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Info => f.write_str("INFO"),
            Command::Ping => f.write_str("PING"),
            Command::Help => f.write_str("HELP"),
            Command::CountAll => f.write_str("COUNT ALL"),
            Command::CountAllInMem => f.write_str("COUNT ALL IN MEM"),
            Command::Create(db) => write!(f, "CREATE {}", db),
            Command::Use(db) => write!(f, "USE {}", db),
            Command::Clear => f.write_str("CLEAR"),
            Command::ClearAll => f.write_str("CLEAR ALL"),
            Command::Flush => f.write_str("FLUSH"),
            Command::FlushAll => f.write_str("FLUSH ALL"),
            Command::Insert { update, db } => write!(f, "INSERT {} INTO {}", update, db),
            Command::Add(update) => write!(f, "ADD {}", update),
            Command::BulkAdd => f.write_str("BULKADD"),
            Command::BulkRow(update) => write!(f, "{}", update),
            Command::BulkEnd => f.write_str("DDAKLUB"),
            Command::GetAllJson => f.write_str("GET ALL AS JSON"),
            Command::GetJson(n) => write!(f, "GET {} AS JSON", n),
            Command::GetRangeCsv { start, finish } => {
                write!(f, "GET ALL FROM {} TO {} AS CSV", start, finish)
            }
            Command::Subscribe(db) => write!(f, "SUBSCRIBE {}", db),
            Command::Unsubscribe => f.write_str("UNSUBSCRIBE"),
            Command::Poll => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Update {
        Update::new(1505177459658, 139010, true, false, 0.5, 7.25)
    }

    #[test]
    fn test_fixed_commands() {
        assert_eq!(Command::Info.to_string(), "INFO");
        assert_eq!(Command::Ping.to_string(), "PING");
        assert_eq!(Command::Help.to_string(), "HELP");
        assert_eq!(Command::CountAll.to_string(), "COUNT ALL");
        assert_eq!(Command::CountAllInMem.to_string(), "COUNT ALL IN MEM");
        assert_eq!(Command::Clear.to_string(), "CLEAR");
        assert_eq!(Command::ClearAll.to_string(), "CLEAR ALL");
        assert_eq!(Command::Flush.to_string(), "FLUSH");
        assert_eq!(Command::FlushAll.to_string(), "FLUSH ALL");
        assert_eq!(Command::GetAllJson.to_string(), "GET ALL AS JSON");
        assert_eq!(Command::Unsubscribe.to_string(), "UNSUBSCRIBE");
    }

    #[test]
    fn test_database_commands() {
        assert_eq!(
            Command::Create("bnc_xrp_btc".into()).to_string(),
            "CREATE bnc_xrp_btc"
        );
        assert_eq!(Command::Use("default".into()).to_string(), "USE default");
        assert_eq!(
            Command::Subscribe("default".into()).to_string(),
            "SUBSCRIBE default"
        );
    }

    #[test]
    fn test_row_commands() {
        assert_eq!(
            Command::Insert {
                update: row(),
                db: "default".into()
            }
            .to_string(),
            "INSERT 1505177459658, 139010, t, f, 0.5, 7.25; INTO default"
        );
        assert_eq!(
            Command::Add(row()).to_string(),
            "ADD 1505177459658, 139010, t, f, 0.5, 7.25;"
        );
        assert_eq!(
            Command::BulkRow(row()).to_string(),
            "1505177459658, 139010, t, f, 0.5, 7.25;"
        );
        assert_eq!(Command::BulkAdd.to_string(), "BULKADD");
        assert_eq!(Command::BulkEnd.to_string(), "DDAKLUB");
    }

    #[test]
    fn test_query_commands() {
        assert_eq!(Command::GetJson(10).to_string(), "GET 10 AS JSON");
        assert_eq!(
            Command::GetRangeCsv {
                start: 1505177459,
                finish: 1505177460
            }
            .to_string(),
            "GET ALL FROM 1505177459 TO 1505177460 AS CSV"
        );
    }

    #[test]
    fn test_poll_is_bare_newline() {
        assert_eq!(Command::Poll.to_string(), "");
        assert_eq!(&Command::Poll.encode()[..], b"\n");
    }

    #[test]
    fn test_encode_terminates_with_newline() {
        assert_eq!(&Command::Ping.encode()[..], b"PING\n");
        let encoded = Command::Add(row()).encode();
        assert_eq!(encoded.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(encoded.last(), Some(&b'\n'));
    }
}
