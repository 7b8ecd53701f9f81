//! Serial command protocol and routing into the session
//!
//! A command is one line of ASCII hex:
//!
//! ```text
//! MM KK CC LL BBBBBBBBBBBB SS..
//! mode, key type, channel, SSID length, BSSID, SSID (LL bytes)
//! ```
//!
//! Only the mode is mandatory; fields not present read as zero. The sniffer
//! acts on sniff start / stop. Every other mode is handed back to the caller.

use log::{debug, info, warn};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use wlan_capture::{FrameHandler, FrameSource, MacAddr, SubscriptionHandle};

use crate::filter::{CaptureMode, TargetSelector};
use crate::session::Session;
use crate::{Result, SnifferError};

/// Longest accepted command line
pub const MAX_COMMAND_LEN: usize = 82;

const SSID_OFFSET: usize = 20;

/// Longest SSID a command line can carry: 31 bytes, one short of 802.11's 32
pub const MAX_SSID_LEN: usize = (MAX_COMMAND_LEN - SSID_OFFSET) / 2;

/// Command modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandMode {
    Null,
    DeauthStart,
    DeauthStop,
    ApStart,
    ApStop,
    SniffStart,
    SniffStop,
    Scan,
    PskCorrect,
    PskIncorrect,
    Restart,
    ClientTarget,
    Unknown(u8),
}

impl From<u8> for CommandMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::DeauthStart,
            2 => Self::DeauthStop,
            3 => Self::ApStart,
            4 => Self::ApStop,
            5 => Self::SniffStart,
            6 => Self::SniffStop,
            7 => Self::Scan,
            8 => Self::PskCorrect,
            9 => Self::PskIncorrect,
            11 => Self::Restart,
            12 => Self::ClientTarget,
            other => Self::Unknown(other),
        }
    }
}

impl From<CommandMode> for u8 {
    fn from(mode: CommandMode) -> Self {
        match mode {
            CommandMode::Null => 0,
            CommandMode::DeauthStart => 1,
            CommandMode::DeauthStop => 2,
            CommandMode::ApStart => 3,
            CommandMode::ApStop => 4,
            CommandMode::SniffStart => 5,
            CommandMode::SniffStop => 6,
            CommandMode::Scan => 7,
            CommandMode::PskCorrect => 8,
            CommandMode::PskIncorrect => 9,
            CommandMode::Restart => 11,
            CommandMode::ClientTarget => 12,
            CommandMode::Unknown(val) => val,
        }
    }
}

/// One decoded command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub mode: CommandMode,
    pub key_type: u8,
    pub channel: u8,
    pub bssid: MacAddr,
    pub ssid: Vec<u8>,
}

fn hex_byte(line: &str, offset: usize) -> Option<u8> {
    line.get(offset..offset + 2)
        .and_then(|pair| u8::from_str_radix(pair, 16).ok())
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.len() < 2 {
            return Err(SnifferError::Command(format!("Command too short: {:?}", line)));
        }
        if line.len() > MAX_COMMAND_LEN {
            return Err(SnifferError::Command(format!(
                "Command of {} characters exceeds {}",
                line.len(),
                MAX_COMMAND_LEN
            )));
        }
        if !line.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SnifferError::Command(format!("Command is not hex: {:?}", line)));
        }

        let field = |offset: usize| hex_byte(line, offset).unwrap_or(0);
        let mode = CommandMode::from(field(0));
        let key_type = field(2);
        let channel = field(4);
        let ssid_len = field(6) as usize;

        let mut bssid = [0u8; 6];
        for (i, byte) in bssid.iter_mut().enumerate() {
            *byte = field(8 + i * 2);
        }

        if ssid_len > MAX_SSID_LEN {
            return Err(SnifferError::Command(format!("SSID length {} exceeds {}", ssid_len, MAX_SSID_LEN)));
        }
        let ssid = (0..ssid_len)
            .map(|i| hex_byte(line, SSID_OFFSET + i * 2))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| SnifferError::Command(format!("SSID shorter than declared {} bytes", ssid_len)))?;

        Ok(Self {
            mode,
            key_type,
            channel,
            bssid: MacAddr(bssid),
            ssid,
        })
    }

    pub fn sniff_start(bssid: MacAddr, mode: CaptureMode, channel: u8) -> Self {
        Self {
            mode: CommandMode::SniffStart,
            key_type: mode.code(),
            channel,
            bssid,
            ssid: Vec::new(),
        }
    }

    pub fn sniff_stop() -> Self {
        Self {
            mode: CommandMode::SniffStop,
            key_type: 0,
            channel: 0,
            bssid: MacAddr::ZERO,
            ssid: Vec::new(),
        }
    }

    /// Encode back into a command line
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{:02X}{:02X}{:02X}{:02X}",
            u8::from(self.mode),
            self.key_type,
            self.channel,
            self.ssid.len()
        );
        for byte in self.bssid.0.iter().chain(self.ssid.iter()) {
            line.push_str(&format!("{:02X}", byte));
        }
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} key_type={} channel={} bssid={} ssid={}",
            self.mode,
            self.key_type,
            self.channel,
            self.bssid,
            String::from_utf8_lossy(&self.ssid)
        )
    }
}

/// What the router did with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Ignored,
    Armed { target: TargetSelector, channel: u8 },
    Disarmed,
    /// Belongs to another collaborator (deauth, access point, scan, ...)
    External(CommandMode),
}

/// Applies sniff commands to a session and keeps it subscribed to a frame source
pub struct CommandRouter<S: FrameSource + ?Sized> {
    session: Arc<Session>,
    source: Arc<S>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<S: FrameSource + ?Sized> CommandRouter<S> {
    pub fn new(session: Arc<Session>, source: Arc<S>) -> Self {
        Self {
            session,
            source,
            subscription: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Parse and route one command line
    pub fn handle_line(&self, line: &str) -> Result<Routed> {
        let command = Command::parse(line)?;
        self.handle(&command)
    }

    pub fn handle(&self, command: &Command) -> Result<Routed> {
        debug!("Command: {}", command);
        match command.mode {
            CommandMode::Null => Ok(Routed::Ignored),
            CommandMode::SniffStart => self.start(command),
            CommandMode::SniffStop => self.stop(),
            other => Ok(Routed::External(other)),
        }
    }

    fn start(&self, command: &Command) -> Result<Routed> {
        let mode = CaptureMode::try_from(command.key_type)?;
        if !(1..=14).contains(&command.channel) {
            warn!("Sniff start on channel {} outside 1-14", command.channel);
        }

        self.session.set_target(command.bssid, mode);

        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if subscription.is_none() {
            let handler: Arc<dyn FrameHandler> = self.session.clone();
            *subscription = Some(self.source.subscribe(handler));
            info!("Session subscribed to frame source");
        }

        Ok(Routed::Armed {
            target: TargetSelector::new(command.bssid, mode),
            channel: command.channel,
        })
    }

    fn stop(&self) -> Result<Routed> {
        self.session.clear_target();

        let handle = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            self.source.unsubscribe(handle)?;
            info!("Session unsubscribed from frame source");
        }
        Ok(Routed::Disarmed)
    }
}
