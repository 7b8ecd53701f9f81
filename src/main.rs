//! eapol-sniffer binary
//!
//! Arms a capture session from the command line, a configuration file or
//! serial command lines on stdin, replays a pcap capture through it and
//! prints every artifact found.

use clap::{Arg, Command};
use eapol_sniffer::{
    command::Command as SerialCommand, replay, Artifact, ArtifactEmitter, ChannelEmitter, CommandRouter,
    ConfigManager, FrameHub, Message1Record, OutputFormat, Result, Routed, Session, SnifferConfig, SnifferError,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "eapol-sniffer.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("eapol-sniffer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extracts PMKID and handshake MIC material from 802.11 captures")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (json, toml or yaml)")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("pcap")
                .short('r')
                .long("pcap")
                .value_name("FILE")
                .help("Legacy pcap capture to replay (802.11 or radiotap)"),
        )
        .arg(
            Arg::new("bssid")
                .short('b')
                .long("bssid")
                .value_name("MAC")
                .help("Target BSSID"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Capture mode (pmkid, mic)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format (serial, json, hashcat)"),
        )
        .arg(
            Arg::new("essid")
                .long("essid")
                .value_name("NAME")
                .help("Network name used in hashcat output"),
        )
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .help("Read serial command lines from stdin before replaying")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    let config_path = PathBuf::from(matches.get_one::<String>("config").map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH));
    let mut config = load_configuration(&config_path)?;

    if let Some(bssid) = matches.get_one::<String>("bssid") {
        config.capture.target_bssid = Some(bssid.clone());
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.capture.mode = Some(mode.clone());
    }
    if let Some(format) = matches.get_one::<String>("format") {
        config.output.format = format.clone();
    }
    if let Some(essid) = matches.get_one::<String>("essid") {
        config.output.essid = Some(essid.clone());
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    init_logging(&config.logging.level)?;
    info!("Starting eapol-sniffer v{}", env!("CARGO_PKG_VERSION"));

    let manager = ConfigManager::with_config(config);
    let validation = manager.validate_config(manager.get_config())?;
    for warning in &validation.warnings {
        warn!("Configuration: {}", warning);
    }
    if !validation.valid {
        for err in &validation.errors {
            error!("Configuration: {}", err);
        }
        process::exit(1);
    }

    let pcap = matches.get_one::<String>("pcap").map(PathBuf::from);
    let read_stdin = matches.get_flag("stdin");

    match run(manager.get_config(), pcap, read_stdin).await {
        Ok(()) => {
            info!("eapol-sniffer finished");
            Ok(())
        }
        Err(e) => {
            error!("eapol-sniffer error: {}", e);
            process::exit(1);
        }
    }
}

/// Initialize logging system
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| SnifferError::Config(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Load configuration from file, falling back to defaults when it is absent
fn load_configuration(config_path: &Path) -> Result<SnifferConfig> {
    if !config_path.exists() {
        return Ok(SnifferConfig::default());
    }
    Ok(ConfigManager::load_from_file(config_path)?.get_config().clone())
}

async fn run(config: &SnifferConfig, pcap: Option<PathBuf>, read_stdin: bool) -> Result<()> {
    let format = config.output_format()?;
    let essid = config.output.essid.clone().unwrap_or_default().into_bytes();

    let (emitter, rx) = ChannelEmitter::new(config.output.channel_capacity);
    let emitter = Arc::new(emitter);
    let printer = tokio::spawn(print_artifacts(rx, format, essid));

    let session = Arc::new(
        Session::new(emitter.clone() as Arc<dyn ArtifactEmitter>).with_max_key_data(config.capture.max_key_data),
    );
    let hub = Arc::new(FrameHub::new());
    let router = CommandRouter::new(session.clone(), hub.clone());

    if let Some(target) = config.target()? {
        router.handle(&SerialCommand::sniff_start(target.bssid, target.mode, config.capture.channel))?;
    }

    if read_stdin {
        read_commands(&router).await?;
    }

    match pcap {
        Some(path) => {
            if !session.is_armed() {
                warn!("No target armed, every frame will be dropped");
            }
            let cancel = Arc::new(AtomicBool::new(false));
            let replay_hub = hub.clone();
            let replay_cancel = cancel.clone();
            let mut replay =
                tokio::task::spawn_blocking(move || replay::replay_pcap(path, &replay_hub, &replay_cancel));
            let joined = tokio::select! {
                joined = &mut replay => joined,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping");
                    cancel.store(true, Ordering::Relaxed);
                    replay.await
                }
            };
            let summary = joined.map_err(|e| SnifferError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
            info!("Replay: {}", serde_json::to_string(&summary)?);
        }
        None if !read_stdin => warn!("Nothing to do: pass --pcap or --stdin"),
        None => {}
    }

    info!("Stats: {}", serde_json::to_string(&session.stats().snapshot())?);

    // Unsubscribing releases the hub's handle on the session, so the last
    // sender goes away with the emitter below and the printer drains and exits.
    router.handle(&SerialCommand::sniff_stop())?;
    if emitter.overflow() > 0 {
        warn!("{} artifacts lost to a full output channel", emitter.overflow());
    }
    drop(router);
    drop(session);
    drop(emitter);

    printer
        .await
        .map_err(|e| SnifferError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(())
}

/// Apply serial command lines from stdin until EOF
async fn read_commands(router: &CommandRouter<FrameHub>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match router.handle_line(&line) {
            Ok(Routed::External(mode)) => info!("Mode {:?} is not handled by the sniffer", mode),
            Ok(routed) => info!("Command applied: {:?}", routed),
            Err(e) => warn!("Rejected command {:?}: {}", line, e),
        }
    }
    Ok(())
}

/// Render artifacts to stdout until every sender is gone
async fn print_artifacts(mut rx: mpsc::Receiver<Artifact>, format: OutputFormat, essid: Vec<u8>) {
    let mut message1: Option<Message1Record> = None;

    while let Some(artifact) = rx.recv().await {
        match format {
            OutputFormat::Serial => println!("{}", artifact),
            OutputFormat::Json => match artifact.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to render artifact: {}", e),
            },
            OutputFormat::Hashcat => match artifact {
                Artifact::Pmkid(record) => println!("{}", record.to_hashcat_22000(&essid)),
                Artifact::Message1(record) => message1 = Some(record),
                Artifact::Message2(record) => {
                    match message1.and_then(|m1| record.to_hashcat_22000(&m1, &essid)) {
                        Some(line) => println!("{}", line),
                        None => warn!("Message 2 from {} has no matching message 1", record.station),
                    }
                }
            },
        }
    }
}
