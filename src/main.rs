//! VibeMQ Connect - inspect and craft MQTT CONNECT packets
//!
//! Usage:
//!   vibemq-connect [OPTIONS] <COMMAND>
//!
//! Commands:
//!   decode   Decode a hex-encoded CONNECT packet and print its fields
//!   encode   Build a CONNECT packet from options and print it as hex
//!   check    Decode a CONNECT packet and evaluate it against the policy
//!
//! Options:
//!   -c, --config <FILE>    Configuration file path
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   -h, --help             Print help

use std::path::PathBuf;
use std::process::ExitCode;

use bytes::BytesMut;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use vibemq_connect::codec::{decode_framed, encode_framed};
use vibemq_connect::config::Config;
use vibemq_connect::policy::ConnectPolicy;
use vibemq_connect::protocol::{ConnectPacket, QoS};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn from_config(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }
}

/// VibeMQ Connect - MQTT CONNECT packet tool
#[derive(Parser, Debug)]
#[command(name = "vibemq-connect")]
#[command(author = "VibeMQ Contributors")]
#[command(version)]
#[command(about = "Decode, encode and check MQTT v3.1.1 CONNECT packets")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a hex-encoded CONNECT packet and print its fields
    Decode {
        #[command(flatten)]
        input: Input,
    },
    /// Build a CONNECT packet and print it as hex
    Encode(EncodeArgs),
    /// Decode a CONNECT packet and evaluate it against the connection policy
    Check {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(clap::Args, Debug)]
struct Input {
    /// Packet bytes as hex (whitespace allowed)
    #[arg(required_unless_present = "file")]
    hex: Option<String>,

    /// Read raw packet bytes from a file instead
    #[arg(short, long, conflicts_with = "hex")]
    file: Option<PathBuf>,

    /// Input is the CONNECT body only, without the fixed header
    #[arg(long)]
    body: bool,
}

#[derive(clap::Args, Debug)]
struct EncodeArgs {
    /// Client identifier (may be empty)
    #[arg(long, default_value = "")]
    client_id: String,

    /// Keep alive interval in seconds
    #[arg(long, default_value_t = 60)]
    keep_alive: u16,

    /// Request a persistent session
    #[arg(long)]
    no_clean_session: bool,

    /// Will topic
    #[arg(long, requires = "will_message")]
    will_topic: Option<String>,

    /// Will message
    #[arg(long, requires = "will_topic")]
    will_message: Option<String>,

    /// Will QoS (0, 1, or 2)
    #[arg(long, requires = "will_topic", value_parser = clap::value_parser!(u8).range(0..=2))]
    will_qos: Option<u8>,

    /// Retain the will message
    #[arg(long, requires = "will_topic")]
    will_retain: bool,

    /// Username
    #[arg(long)]
    username: Option<String>,

    /// Password (requires a username)
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Protocol name
    #[arg(long, requires = "protocol_level")]
    protocol_name: Option<String>,

    /// Protocol level
    #[arg(long, requires = "protocol_name")]
    protocol_level: Option<u8>,

    /// Print the CONNECT body only, without the fixed header
    #[arg(long)]
    body: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration file if specified, otherwise defaults and environment
    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // CLI overrides config, config overrides default (warn)
    let log_level = args
        .log_level
        .unwrap_or_else(|| LogLevel::from_config(&config.log.level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing logger: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let result = match args.command {
        Command::Decode { input } => decode(&input, &config),
        Command::Encode(encode_args) => encode(&encode_args),
        Command::Check { input } => check(&input, &config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

fn read_input(input: &Input) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(path) = &input.file {
        return Ok(std::fs::read(path)?);
    }
    let text: String = input
        .hex
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    Ok(hex::decode(text)?)
}

fn decode_packet(input: &Input, config: &Config) -> Result<ConnectPacket, Box<dyn std::error::Error>> {
    let bytes = read_input(input)?;
    debug!("Decoding {} bytes (body only: {})", bytes.len(), input.body);

    if input.body {
        return Ok(ConnectPacket::decode(&bytes)?);
    }

    match decode_framed(&bytes, config.limits.max_packet_size)? {
        Some((packet, consumed)) => {
            if consumed < bytes.len() {
                info!("Ignoring {} bytes after the packet", bytes.len() - consumed);
            }
            Ok(packet)
        }
        None => Err("incomplete packet".into()),
    }
}

fn decode(input: &Input, config: &Config) -> CliResult {
    let packet = decode_packet(input, config)?;
    print_packet(&packet);
    Ok(ExitCode::SUCCESS)
}

fn check(input: &Input, config: &Config) -> CliResult {
    let policy = ConnectPolicy::new(&config.policy);

    let packet = match decode_packet(input, config) {
        Ok(packet) => packet,
        Err(e) => {
            println!("malformed: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    match policy.evaluate(&packet) {
        Ok(params) => {
            println!("accepted");
            println!("  client_id:      {}", params.client_id);
            println!("  assigned:       {}", params.client_id_assigned);
            println!("  clean_session:  {}", params.clean_session);
            match params.keep_alive.timeout() {
                Some(timeout) => println!(
                    "  keep_alive:     {}s (timeout {:?})",
                    params.keep_alive.interval, timeout
                ),
                None => println!("  keep_alive:     disabled"),
            }
            println!("  will:           {}", params.will.is_some());
            Ok(ExitCode::SUCCESS)
        }
        Err(rejection) => {
            println!("rejected: {}", rejection);
            Ok(ExitCode::from(1))
        }
    }
}

fn encode(args: &EncodeArgs) -> CliResult {
    let mut builder = ConnectPacket::builder(args.client_id.clone())
        .clean_session(!args.no_clean_session)
        .keep_alive(args.keep_alive);

    if let (Some(name), Some(level)) = (&args.protocol_name, args.protocol_level) {
        builder = builder.protocol(name.clone(), level);
    }

    if let (Some(topic), Some(message)) = (&args.will_topic, &args.will_message) {
        let will_qos = args.will_qos.unwrap_or(0);
        let qos = QoS::from_u8(will_qos).ok_or("will QoS must be 0, 1 or 2")?;
        builder = builder.will(topic.clone(), message.clone(), qos, args.will_retain);
    }

    builder = match (&args.username, &args.password) {
        (Some(username), Some(password)) => builder.credentials(username.clone(), password.clone()),
        (Some(username), None) => builder.username(username.clone()),
        _ => builder,
    };

    let packet = builder.build()?;

    let mut buf = BytesMut::new();
    if args.body {
        packet.encode(&mut buf)?;
    } else {
        encode_framed(&packet, &mut buf)?;
    }

    println!("{}", hex::encode(&buf));
    Ok(ExitCode::SUCCESS)
}

fn print_packet(packet: &ConnectPacket) {
    println!("protocol:       {} (level {})", packet.protocol_name(), packet.protocol_level());
    println!("connect flags:  {:#04x}", packet.connect_flags());
    println!("clean_session:  {}", packet.clean_session());
    println!("keep_alive:     {}", packet.keep_alive());
    println!("client_id:      {}", String::from_utf8_lossy(packet.client_id()));
    if let Some(will) = packet.will() {
        println!("will_topic:     {}", String::from_utf8_lossy(&will.topic));
        println!("will_message:   {}", String::from_utf8_lossy(&will.message));
        println!("will_qos:       {}", will.qos as u8);
        println!("will_retain:    {}", will.retain);
    }
    if let Some(username) = packet.username() {
        println!("username:       {}", String::from_utf8_lossy(username));
    }
    if packet.password().is_some() {
        println!("password:       <set>");
    }
}
