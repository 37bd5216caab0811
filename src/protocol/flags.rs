//! CONNECT flags byte
//!
//! ```text
//! bit    7          6          5            4   3      2          1              0
//!     username   password   will retain   will QoS   will flag  clean session  reserved
//! ```

use super::{ErrorKind, QoS};

const RESERVED: u8 = 0x01;
const CLEAN_SESSION: u8 = 0x02;
const WILL_FLAG: u8 = 0x04;
const WILL_QOS_SHIFT: u8 = 3;
const WILL_QOS_MASK: u8 = 0x03;
const WILL_RETAIN: u8 = 0x20;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;

/// Decoded connect flags
///
/// The reserved bit has no field: a `ConnectFlags` value always encodes it as 0.
/// Relationships between the flags (e.g. will QoS without a will) are not
/// checked here; `ConnectPacket::build` enforces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectFlags {
    pub clean_session: bool,
    pub will: bool,
    pub will_qos: QoS,
    pub will_retain: bool,
    pub password: bool,
    pub username: bool,
}

impl ConnectFlags {
    pub fn from_byte(byte: u8) -> Result<Self, ErrorKind> {
        if byte & RESERVED != 0 {
            return Err(ErrorKind::ReservedBitSet);
        }

        let qos_bits = (byte >> WILL_QOS_SHIFT) & WILL_QOS_MASK;
        let will_qos = QoS::from_u8(qos_bits).ok_or(ErrorKind::InvalidWillQoS(qos_bits))?;

        Ok(Self {
            clean_session: byte & CLEAN_SESSION != 0,
            will: byte & WILL_FLAG != 0,
            will_qos,
            will_retain: byte & WILL_RETAIN != 0,
            password: byte & PASSWORD_FLAG != 0,
            username: byte & USERNAME_FLAG != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = (self.will_qos as u8) << WILL_QOS_SHIFT;
        if self.clean_session {
            byte |= CLEAN_SESSION;
        }
        if self.will {
            byte |= WILL_FLAG;
        }
        if self.will_retain {
            byte |= WILL_RETAIN;
        }
        if self.password {
            byte |= PASSWORD_FLAG;
        }
        if self.username {
            byte |= USERNAME_FLAG;
        }
        byte
    }
}
