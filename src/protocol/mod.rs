//! CONNECT packet model
//!
//! Typed flags, the validated packet entity and its error taxonomy.

mod error;
mod flags;
mod packet;

pub use error::{ConnectError, ErrorKind, Phase};
pub use flags::ConnectFlags;
pub use packet::{ConnectBuilder, ConnectFields, ConnectPacket, Will};

/// Protocol name used by MQTT v3.1.1 and later
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol name used by MQTT v3.1
pub const LEGACY_PROTOCOL_NAME: &str = "MQIsdp";

/// Protocol level written by `ConnectBuilder` unless overridden
pub const DEFAULT_PROTOCOL_LEVEL: u8 = ProtocolVersion::V311 as u8;

/// Well-known protocol levels
///
/// The codec carries the raw level byte; this enum only names the levels a
/// caller is likely to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolVersion {
    /// MQTT v3.1 (protocol level 3, name "MQIsdp")
    V31 = 3,
    /// MQTT v3.1.1 (protocol level 4)
    V311 = 4,
    /// MQTT v5.0 (protocol level 5)
    V5 = 5,
}

impl ProtocolVersion {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            3 => Some(ProtocolVersion::V31),
            4 => Some(ProtocolVersion::V311),
            5 => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    /// Protocol name that accompanies this level on the wire
    pub fn protocol_name(self) -> &'static str {
        match self {
            ProtocolVersion::V31 => LEGACY_PROTOCOL_NAME,
            ProtocolVersion::V311 | ProtocolVersion::V5 => PROTOCOL_NAME,
        }
    }
}

/// Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}
