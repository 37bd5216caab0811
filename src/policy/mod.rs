//! Connection policy
//!
//! Turns a decoded `ConnectPacket` into the inputs a session supervisor needs:
//! accept/reject with a CONNACK return code, the effective client identifier,
//! the keep alive deadline and the will to arm. Nothing here owns timers or
//! sockets; the supervisor drives those from `SessionParams`.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::config::PolicyConfig;
use crate::protocol::{ConnectError, ConnectPacket, QoS};


/// MQTT v3.1.1 CONNACK return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Accepted = 0x00,
    UnacceptableProtocolVersion = 0x01,
    IdentifierRejected = 0x02,
    ServerUnavailable = 0x03,
    BadUsernameOrPassword = 0x04,
    NotAuthorized = 0x05,
}

impl ConnectReturnCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(ConnectReturnCode::Accepted),
            0x01 => Some(ConnectReturnCode::UnacceptableProtocolVersion),
            0x02 => Some(ConnectReturnCode::IdentifierRejected),
            0x03 => Some(ConnectReturnCode::ServerUnavailable),
            0x04 => Some(ConnectReturnCode::BadUsernameOrPassword),
            0x05 => Some(ConnectReturnCode::NotAuthorized),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "Connection Accepted",
            Self::UnacceptableProtocolVersion => "Unacceptable Protocol Version",
            Self::IdentifierRejected => "Identifier Rejected",
            Self::ServerUnavailable => "Server Unavailable",
            Self::BadUsernameOrPassword => "Bad User Name or Password",
            Self::NotAuthorized => "Not Authorized",
        };
        write!(f, "{}", s)
    }
}

/// Why a connection attempt is refused, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// CONNACK to send before closing; `None` closes the transport silently
    pub response: Option<ConnectReturnCode>,
    pub reason: &'static str,
}

impl Rejection {
    fn respond(code: ConnectReturnCode, reason: &'static str) -> Self {
        Self {
            response: Some(code),
            reason,
        }
    }

    fn close(reason: &'static str) -> Self {
        Self {
            response: None,
            reason,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.response {
            Some(code) => write!(f, "{} (CONNACK {:#04x}: {})", self.reason, code.as_u8(), code),
            None => write!(f, "{} (close without CONNACK)", self.reason),
        }
    }
}

/// Keep alive supervision derived from the negotiated interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    /// Interval declared by the client, in seconds
    pub interval: u16,
    timeout: Option<Duration>,
}

impl KeepAlive {
    /// `grace` scales the interval into the server-side timeout (1.5 by default);
    /// values below 1.0 or NaN count as 1.0. `ceiling` caps the timeout if set.
    pub fn new(interval: u16, grace: f64, ceiling: Option<Duration>) -> Self {
        let grace = grace.max(1.0);
        let timeout = (interval != 0).then(|| {
            let timeout = Duration::try_from_secs_f64(f64::from(interval) * grace)
                .unwrap_or(Duration::MAX);
            match ceiling {
                Some(max) => timeout.min(max),
                None => timeout,
            }
        });
        Self { interval, timeout }
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// Longest silence tolerated before disconnecting; `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether `idle` time without a packet from the client exceeds the timeout
    pub fn is_expired(&self, idle: Duration) -> bool {
        match self.timeout {
            Some(timeout) => idle > timeout,
            None => false,
        }
    }
}

/// Events that end a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WillTrigger {
    /// I/O error or network failure
    IoError,
    /// Nothing received within the keep alive timeout
    KeepAliveTimeout,
    /// Transport closed without a DISCONNECT packet
    ClosedWithoutDisconnect,
    /// Server closed the connection after a protocol error
    ProtocolViolation,
    /// Client sent DISCONNECT
    Disconnect,
}

/// Will message to publish if the connection ends ungracefully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillConfig {
    pub topic: Bytes,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl WillConfig {
    /// Whether the will is published when the connection ends because of `trigger`
    pub fn publishes_on(&self, trigger: WillTrigger) -> bool {
        trigger != WillTrigger::Disconnect
    }
}

/// Everything the session supervisor needs from an accepted CONNECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub client_id: String,
    /// Client sent an empty identifier and the server assigned one
    pub client_id_assigned: bool,
    pub protocol_level: u8,
    pub clean_session: bool,
    pub keep_alive: KeepAlive,
    pub will: Option<WillConfig>,
    pub username: Option<Bytes>,
    pub password: Option<Bytes>,
}

/// Acceptance rules applied to decoded CONNECT packets
#[derive(Debug, Clone)]
pub struct ConnectPolicy {
    protocol_names: Vec<String>,
    protocol_levels: Vec<u8>,
    allow_empty_client_id: bool,
    assigned_client_id_prefix: String,
    max_client_id_len: usize,
    keep_alive_grace: f64,
    max_keep_alive_timeout: Option<Duration>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}

impl ConnectPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            protocol_names: config.protocol_names.clone(),
            protocol_levels: config.protocol_levels.clone(),
            allow_empty_client_id: config.allow_empty_client_id,
            assigned_client_id_prefix: config.assigned_client_id_prefix.clone(),
            max_client_id_len: config.max_client_id_len,
            keep_alive_grace: config.keep_alive_grace,
            max_keep_alive_timeout: config.max_keep_alive_timeout_duration(),
        }
    }

    /// Decide whether to accept `packet` and derive the session parameters
    pub fn evaluate(&self, packet: &ConnectPacket) -> Result<SessionParams, Rejection> {
        if !self
            .protocol_names
            .iter()
            .any(|name| name == packet.protocol_name())
        {
            debug!("Rejecting unknown protocol name {:?}", packet.protocol_name());
            return Err(Rejection::close("unknown protocol name"));
        }

        if !self.protocol_levels.contains(&packet.protocol_level()) {
            debug!("Rejecting unsupported protocol level {}", packet.protocol_level());
            return Err(Rejection::respond(
                ConnectReturnCode::UnacceptableProtocolVersion,
                "unsupported protocol level",
            ));
        }

        let (client_id, client_id_assigned) = self.client_id(packet)?;

        let keep_alive = KeepAlive::new(
            packet.keep_alive(),
            self.keep_alive_grace,
            self.max_keep_alive_timeout,
        );

        let will = packet.will().map(|will| WillConfig {
            topic: will.topic,
            message: will.message,
            qos: will.qos,
            retain: will.retain,
        });

        debug!(
            "Accepted CONNECT (client_id: {}, clean_session: {}, keep_alive: {}s, will: {})",
            client_id,
            packet.clean_session(),
            packet.keep_alive(),
            will.is_some()
        );

        Ok(SessionParams {
            client_id,
            client_id_assigned,
            protocol_level: packet.protocol_level(),
            clean_session: packet.clean_session(),
            keep_alive,
            will,
            username: packet.username().cloned(),
            password: packet.password().cloned(),
        })
    }

    /// Response to a CONNECT that failed to decode
    pub fn on_decode_error(&self, error: &ConnectError) -> Rejection {
        debug!("Closing connection after malformed CONNECT: {}", error);
        Rejection::close("malformed CONNECT packet")
    }

    fn client_id(&self, packet: &ConnectPacket) -> Result<(String, bool), Rejection> {
        let raw = packet.client_id();

        if raw.is_empty() {
            // [MQTT-3.1.3-8] empty identifier requires a clean session
            if !packet.clean_session() {
                debug!("Rejecting empty client ID with clean_session=false");
                return Err(Rejection::respond(
                    ConnectReturnCode::IdentifierRejected,
                    "empty client ID with clean_session=false",
                ));
            }
            if !self.allow_empty_client_id {
                debug!("Rejecting empty client ID");
                return Err(Rejection::respond(
                    ConnectReturnCode::IdentifierRejected,
                    "empty client ID not allowed",
                ));
            }
            let assigned = format!("{}{:x}", self.assigned_client_id_prefix, rand_id());
            return Ok((assigned, true));
        }

        if raw.len() > self.max_client_id_len {
            debug!("Rejecting client ID of {} bytes", raw.len());
            return Err(Rejection::respond(
                ConnectReturnCode::IdentifierRejected,
                "client ID too long",
            ));
        }

        match std::str::from_utf8(raw) {
            Ok(id) => Ok((id.to_string(), false)),
            Err(_) => {
                debug!("Rejecting non UTF-8 client ID");
                Err(Rejection::respond(
                    ConnectReturnCode::IdentifierRejected,
                    "client ID is not valid UTF-8",
                ))
            }
        }
    }
}

fn rand_id() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish()
}
