//! VibeMQ Connect - MQTT v3.1.1 CONNECT packet codec
//!
//! Decodes, validates and encodes the CONNECT packet body (variable header and
//! payload), with typed connect flags, phase-tagged errors, an optional fixed
//! header wrapper and the connection policy a session supervisor applies to
//! an accepted packet.

pub mod codec;
pub mod config;
pub mod policy;
pub mod protocol;

pub use codec::{decode_framed, encode_framed, FrameError};
pub use config::Config;
pub use policy::{ConnectPolicy, ConnectReturnCode, Rejection, SessionParams};
pub use protocol::{
    ConnectBuilder, ConnectError, ConnectFields, ConnectFlags, ConnectPacket, ErrorKind, Phase,
    ProtocolVersion, QoS,
};
