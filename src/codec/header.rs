//! CONNECT variable header
//!
//! Protocol name, protocol level, connect flags and keep alive, always in
//! that order. The protocol name and level are carried as-is; deciding
//! whether they are acceptable is left to the caller (see `policy`).

use bytes::{BufMut, BytesMut};

use super::{write_string, Reader};
use crate::protocol::{ConnectError, ConnectFlags, ErrorKind};

/// Decoded variable header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableHeader {
    pub protocol_name: String,
    pub protocol_level: u8,
    pub flags: ConnectFlags,
    /// Keep alive interval in seconds (0 = disabled)
    pub keep_alive: u16,
}

impl VariableHeader {
    /// Decode the variable header from the start of `buf`
    /// Returns (header, bytes_consumed) or error
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ConnectError> {
        let mut reader = Reader::new(buf);
        let header = Self::read(&mut reader)?;
        Ok((header, reader.position()))
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, ConnectError> {
        // Protocol name
        if reader.remaining() < 2 {
            return Err(ConnectError::header(ErrorKind::TruncatedHeader));
        }
        let protocol_name = reader.read_string().map_err(ConnectError::header)?;

        // Protocol level
        let protocol_level = reader
            .read_u8()
            .ok_or(ConnectError::header(ErrorKind::TruncatedHeader))?;

        // Connect flags
        let flag_byte = reader
            .read_u8()
            .ok_or(ConnectError::header(ErrorKind::TruncatedHeader))?;
        let flags = ConnectFlags::from_byte(flag_byte).map_err(ConnectError::header)?;

        // Keep alive
        let keep_alive = reader
            .read_u16()
            .ok_or(ConnectError::header(ErrorKind::TruncatedHeader))?;

        Ok(Self {
            protocol_name: protocol_name.to_string(),
            protocol_level,
            flags,
            keep_alive,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ConnectError> {
        write_string(buf, &self.protocol_name).map_err(ConnectError::header)?;
        buf.put_u8(self.protocol_level);
        buf.put_u8(self.flags.to_byte());
        buf.put_u16(self.keep_alive);
        Ok(())
    }

    /// Number of bytes `encode` writes
    pub fn encoded_len(&self) -> usize {
        2 + self.protocol_name.len() + 1 + 1 + 2
    }
}
