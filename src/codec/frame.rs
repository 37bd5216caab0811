//! CONNECT fixed header
//!
//! Wraps a CONNECT body in its fixed header (`0x10` + remaining length) and
//! unwraps it again. Only the CONNECT packet type is handled.

use std::fmt;

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::protocol::{ConnectError, ConnectPacket};

/// CONNECT packet type (upper nibble of the first byte)
pub const CONNECT_PACKET_TYPE: u8 = 1;

/// Maximum remaining length (268,435,455 bytes = ~256 MB)
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Errors from the fixed header or the CONNECT body it frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// First byte is not a CONNECT packet type
    InvalidPacketType(u8),
    /// Reserved fixed header flags are not 0000
    InvalidFixedHeaderFlags(u8),
    /// Invalid remaining length encoding
    InvalidRemainingLength,
    /// Remaining length exceeds the configured maximum
    PacketTooLarge,
    /// CONNECT body could not be encoded or decoded
    Connect(ConnectError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPacketType(t) => write!(f, "not a CONNECT packet: type {}", t),
            Self::InvalidFixedHeaderFlags(flags) => {
                write!(f, "invalid fixed header flags: {:#06b}", flags)
            }
            Self::InvalidRemainingLength => write!(f, "invalid remaining length encoding"),
            Self::PacketTooLarge => write!(f, "packet too large"),
            Self::Connect(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectError> for FrameError {
    fn from(e: ConnectError) -> Self {
        FrameError::Connect(e)
    }
}

/// Read a Variable Byte Integer from buffer
/// Returns Ok(None) if the encoding is cut short, else (value, bytes_consumed)
#[inline]
pub fn read_variable_int(buf: &[u8]) -> Result<Option<(u32, usize)>, FrameError> {
    let mut multiplier: u32 = 1;
    let mut value: u32 = 0;
    let mut pos = 0;

    loop {
        if pos >= 4 {
            return Err(FrameError::InvalidRemainingLength);
        }
        let Some(&byte) = buf.get(pos) else {
            return Ok(None);
        };
        value += ((byte & 0x7F) as u32) * multiplier;
        pos += 1;

        if (byte & 0x80) == 0 {
            break;
        }

        multiplier *= 128;
    }

    Ok(Some((value, pos)))
}

/// Write a Variable Byte Integer to buffer
/// Returns bytes written
#[inline]
pub fn write_variable_int(buf: &mut BytesMut, mut value: u32) -> Result<usize, FrameError> {
    if value > MAX_REMAINING_LENGTH as u32 {
        return Err(FrameError::PacketTooLarge);
    }

    let mut count = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        count += 1;
        if value == 0 {
            break;
        }
    }
    Ok(count)
}

/// Calculate the number of bytes needed to encode a Variable Byte Integer
#[inline]
pub fn variable_int_len(value: u32) -> usize {
    if value < 128 {
        1
    } else if value < 16_384 {
        2
    } else if value < 2_097_152 {
        3
    } else {
        4
    }
}

/// Encode `packet` with its fixed header
pub fn encode_framed(packet: &ConnectPacket, buf: &mut BytesMut) -> Result<(), FrameError> {
    let remaining_length = packet.encoded_len();
    if remaining_length > MAX_REMAINING_LENGTH {
        return Err(FrameError::PacketTooLarge);
    }

    let mut body = BytesMut::with_capacity(remaining_length);
    packet.encode(&mut body)?;

    buf.reserve(1 + variable_int_len(remaining_length as u32) + remaining_length);
    buf.put_u8(CONNECT_PACKET_TYPE << 4);
    write_variable_int(buf, remaining_length as u32)?;
    buf.extend_from_slice(&body);
    Ok(())
}

/// Decode a framed CONNECT packet from the start of `buf`
/// Returns Ok(None) until the whole packet is buffered, else (packet, bytes_consumed)
pub fn decode_framed(
    buf: &[u8],
    max_packet_size: usize,
) -> Result<Option<(ConnectPacket, usize)>, FrameError> {
    let Some(&first_byte) = buf.first() else {
        return Ok(None);
    };

    let packet_type = first_byte >> 4;
    let flags = first_byte & 0x0F;
    if packet_type != CONNECT_PACKET_TYPE {
        return Err(FrameError::InvalidPacketType(packet_type));
    }
    if flags != 0 {
        return Err(FrameError::InvalidFixedHeaderFlags(flags));
    }

    let Some((remaining_length, len_bytes)) = read_variable_int(&buf[1..])? else {
        return Ok(None);
    };
    let remaining_length = remaining_length as usize;

    if remaining_length > max_packet_size.min(MAX_REMAINING_LENGTH) {
        return Err(FrameError::PacketTooLarge);
    }

    let total_len = 1 + len_bytes + remaining_length;
    if buf.len() < total_len {
        trace!(
            "CONNECT incomplete: have {} of {} bytes",
            buf.len(),
            total_len
        );
        return Ok(None);
    }

    let packet = ConnectPacket::decode(&buf[1 + len_bytes..total_len])?;
    Ok(Some((packet, total_len)))
}
