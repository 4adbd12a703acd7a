//! Tick rows.

use crate::error::ProtocolError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One order book update or trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Timestamp in milliseconds.
    #[serde(deserialize_with = "deserialize_ts")]
    pub ts: u64,
    pub seq: u32,
    pub is_trade: bool,
    pub is_bid: bool,
    pub price: f32,
    pub size: f32,
}

impl Update {
    pub fn new(ts: u64, seq: u32, is_trade: bool, is_bid: bool, price: f32, size: f32) -> Self {
        Self {
            ts,
            seq,
            is_trade,
            is_bid,
            price,
            size,
        }
    }
}

/// Serializes a flag as the single-character token the server expects.
pub fn flag_token(flag: bool) -> char {
    if flag {
        't'
    } else {
        'f'
    }
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "t" => Some(true),
        "f" => Some(false),
        _ => None,
    }
}

/// Row text: `<ts>, <seq>, <t|f>, <t|f>, <price>, <size>;`
impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {};",
            self.ts,
            self.seq,
            flag_token(self.is_trade),
            flag_token(self.is_bid),
            self.price,
            self.size
        )
    }
}

impl FromStr for Update {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidRow(s.to_string());

        let row = s.trim();
        let row = row.strip_suffix(';').unwrap_or(row);
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        let [ts, seq, is_trade, is_bid, price, size] = fields[..] else {
            return Err(invalid());
        };

        Ok(Self {
            ts: ts.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
            is_trade: parse_flag(is_trade).ok_or_else(invalid)?,
            is_bid: parse_flag(is_bid).ok_or_else(invalid)?,
            price: price.parse().map_err(|_| invalid())?,
            size: size.parse().map_err(|_| invalid())?,
        })
    }
}

/// Smallest `ts` read as milliseconds. Below it the value is seconds
/// (anything up to the year 5138).
const MILLIS_THRESHOLD: f64 = 1e11;

/// The server renders `ts` in JSON as seconds, with or without a fraction.
/// Values at or above `MILLIS_THRESHOLD` are already milliseconds, which is
/// what `Update` serializes.
fn deserialize_ts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 0.0 {
        return Err(D::Error::custom(format!("invalid timestamp {}", raw)));
    }

    let millis = if raw >= MILLIS_THRESHOLD {
        raw
    } else {
        raw * 1000.0
    };
    Ok(millis.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_text() {
        let update = Update::new(1505177459658, 139010, true, false, 0.0703629, 7.5);
        assert_eq!(
            update.to_string(),
            "1505177459658, 139010, t, f, 0.0703629, 7.5;"
        );

        let zero = Update::new(0, 0, false, true, 0.0, 0.0);
        assert_eq!(zero.to_string(), "0, 0, f, t, 0, 0;");
    }

    #[test]
    fn test_parse_row() {
        let update: Update = "1505177459658, 139010, t, f, 0.0703629, 7.5;".parse().unwrap();
        assert_eq!(update.ts, 1505177459658);
        assert_eq!(update.seq, 139010);
        assert!(update.is_trade);
        assert!(!update.is_bid);
        assert_eq!(update.size, 7.5);

        // Trailing semicolon and spacing are optional.
        let update: Update = "1,2,f,t,3.5,4".parse().unwrap();
        assert_eq!(update, Update::new(1, 2, false, true, 3.5, 4.0));
    }

    #[test]
    fn test_parse_row_rejects_malformed() {
        assert!(matches!(
            "1, 2, t, f, 3.0;".parse::<Update>(),
            Err(ProtocolError::InvalidRow(_))
        ));
        assert!("1, 2, yes, f, 3.0, 4.0;".parse::<Update>().is_err());
        assert!("x, 2, t, f, 3.0, 4.0;".parse::<Update>().is_err());
        assert!("".parse::<Update>().is_err());
    }

    #[test]
    fn test_deserialize_server_json() {
        let json = r#"{"ts":1505177459.658,"seq":139010,"is_trade":true,"is_bid":false,"price":0.0703629,"size":7.65064249}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.ts, 1505177459658);
        assert_eq!(update.seq, 139010);
        assert!(update.is_trade);
        assert!(!update.is_bid);

        let json = r#"{"ts":42,"seq":1,"is_trade":false,"is_bid":true,"price":1.0,"size":2.0}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.ts, 42_000);
    }

    #[test]
    fn test_deserialize_whole_second_ts() {
        let frac = r#"{"ts":1505177459.001,"seq":1,"is_trade":true,"is_bid":true,"price":1.0,"size":1.0}"#;
        let whole = r#"{"ts":1505177459,"seq":1,"is_trade":true,"is_bid":true,"price":1.0,"size":1.0}"#;

        let frac: Update = serde_json::from_str(frac).unwrap();
        let whole: Update = serde_json::from_str(whole).unwrap();
        assert_eq!(frac.ts, 1505177459001);
        assert_eq!(whole.ts, 1505177459000);
    }

    #[test]
    fn test_json_round_trip_keeps_millis() {
        let update = Update::new(1505177459658, 7, false, true, 0.5, 2.0);
        let json = serde_json::to_string(&update).unwrap();
        let back: Update = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn test_deserialize_rejects_negative_ts() {
        let json = r#"{"ts":-1,"seq":1,"is_trade":true,"is_bid":true,"price":1.0,"size":1.0}"#;
        assert!(serde_json::from_str::<Update>(json).is_err());
    }
}
