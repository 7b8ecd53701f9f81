//! Error types for wlan-capture

use thiserror::Error;

/// Why a data-frame header could not be viewed.
///
/// Kept `Copy` so the per-frame path can report it without allocating.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("frame too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("not a data frame")]
    NotData,

    #[error("data frame carries no payload (subtype {subtype})")]
    NoPayload { subtype: u8 },

    #[error("frame body is protected")]
    Protected,
}

/// Main error type for wlan-capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    #[error("Radiotap error: {message}")]
    Radiotap { message: String },

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(u64),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
}

/// Result type alias for wlan-capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;
