use std::io;
use std::num::ParseIntError;

use thiserror::Error;

use crate::wol::ParseError;

pub type Result<T> = std::result::Result<T, WolError>;

/// Every way a run can fail. All of them end the process with exit code 1.
#[derive(Error, Debug)]
pub enum WolError {
    /// Malformed or unknown option
    #[error("{0}")]
    Usage(String),

    /// Non-numeric option value
    #[error("invalid {field} '{value}': {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },

    #[error("invalid port '{0}': must be between 1 and 65535")]
    InvalidPort(String),

    /// Hostname lookup failed
    #[error("{host}, {source}")]
    Resolve { host: String, source: io::Error },

    #[error("{host}, no address associated with hostname")]
    NoAddress { host: String },

    #[error("invalid physical address: {0}")]
    InvalidMac(#[from] ParseError),

    #[error("No Physical Address provided")]
    MissingMac,

    /// Socket creation or send failed
    #[error("{0}")]
    Transport(#[from] io::Error),
}
