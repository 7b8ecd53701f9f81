//! # eapol-sniffer - WPA/WPA2 key material extraction from 802.11 captures
//!
//! Watches a stream of captured frames for the EAPOL-Key messages of one
//! target network and pulls out what an offline password audit needs: the
//! PMKID from message 1, or the anonce from message 1 together with the
//! snonce and MIC from message 2.
//!
//! ## Architecture
//!
//! - `key_info`: table-driven Key Information decoder
//! - `eapol`: bounds-checked LLC/SNAP, EAPOL and EAPOL-Key views
//! - `filter`: target selection and the per-frame eligibility gate
//! - `tracker`: message 1 / message 2 association state machine
//! - `pmkid`: PMKID KDE validation
//! - `artifact`: recovered records, their renderings and emitters
//! - `session` / `dispatch`: shared session state and the per-frame entry point
//! - `command`: serial command protocol and routing
//! - `config`, `stats`, `replay`: configuration, counters and pcap replay

pub mod artifact;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod eapol;
pub mod filter;
pub mod key_info;
pub mod pmkid;
pub mod replay;
pub mod session;
pub mod stats;
pub mod tracker;

pub use crate::{
    artifact::{
        Artifact, ArtifactEmitter, ArtifactKind, ChannelEmitter, CollectingEmitter, Message1Record, Message2Record,
        OutputFormat, PmkidRecord, WriterEmitter,
    },
    command::{Command, CommandMode, CommandRouter, Routed},
    config::{ConfigManager, SnifferConfig, ValidationResult},
    dispatch::Dispatch,
    eapol::{EapolHeader, EapolKey, KeyData},
    filter::{CaptureMode, DropReason, TargetSelector},
    key_info::KeyInformation,
    pmkid::{PmkidRejection, PmkidValidator, PmkidVerdict, RsnPmkidValidator},
    session::Session,
    stats::{SnifferStats, StatsSnapshot},
    tracker::{HandshakeStage, HandshakeTracker},
};

pub use wlan_capture::{CapturedFrame, FrameHub, MacAddr};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnifferError {
    #[error("Capture error: {0}")]
    Capture(#[from] wlan_capture::CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid capture mode: {0}")]
    InvalidCaptureMode(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Pcap error: {0}")]
    Pcap(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnifferError>;

// Constants
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub use eapol::{EAPOL_ETHERTYPE, LLC_SNAP_PREFIX};
