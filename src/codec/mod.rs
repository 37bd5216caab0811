//! CONNECT packet codec
//!
//! The variable header and payload codecs operate on the bytes that follow
//! the fixed header. `frame` adds the fixed header for callers that handle
//! whole packets.

pub mod frame;
pub mod header;
pub mod payload;


pub use frame::{decode_framed, encode_framed, FrameError};
pub use header::VariableHeader;
pub use payload::Payload;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::ErrorKind;

/// Largest length a two byte prefix can describe
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Forward-only view over a packet body
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        let value = read_u16(&self.buf[self.pos..])?;
        self.pos += 2;
        Some(value)
    }

    /// Read a length-prefixed byte string
    #[inline]
    pub(crate) fn read_binary(&mut self) -> Result<&'a [u8], ErrorKind> {
        let (data, len) = read_binary(&self.buf[self.pos..])?;
        self.pos += len;
        Ok(data)
    }

    /// Read a length-prefixed UTF-8 string
    #[inline]
    pub(crate) fn read_string(&mut self) -> Result<&'a str, ErrorKind> {
        let (s, len) = read_string(&self.buf[self.pos..])?;
        self.pos += len;
        Ok(s)
    }
}

/// Read a Two Byte Integer (u16 big-endian)
#[inline]
pub fn read_u16(buf: &[u8]) -> Option<u16> {
    if buf.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]))
}

/// Read binary data
/// Returns (data, bytes_consumed) or error
#[inline]
pub fn read_binary(buf: &[u8]) -> Result<(&[u8], usize), ErrorKind> {
    let len = read_u16(buf).ok_or(ErrorKind::MalformedString)? as usize;
    let total_len = 2 + len;

    if buf.len() < total_len {
        return Err(ErrorKind::MalformedString);
    }

    Ok((&buf[2..total_len], total_len))
}

/// Read a UTF-8 encoded string
/// Returns (string, bytes_consumed) or error
#[inline]
pub fn read_string(buf: &[u8]) -> Result<(&str, usize), ErrorKind> {
    let (data, len) = read_binary(buf)?;
    let s = std::str::from_utf8(data).map_err(|_| ErrorKind::MalformedString)?;
    Ok((s, len))
}

/// Write binary data
#[inline]
pub fn write_binary(buf: &mut BytesMut, data: &[u8]) -> Result<(), ErrorKind> {
    let len = data.len();
    if len > MAX_STRING_LEN {
        return Err(ErrorKind::StringTooLong);
    }
    buf.put_u16(len as u16);
    buf.put_slice(data);
    Ok(())
}

/// Write a UTF-8 encoded string
#[inline]
pub fn write_string(buf: &mut BytesMut, s: &str) -> Result<(), ErrorKind> {
    write_binary(buf, s.as_bytes())
}

/// Size of a length-prefixed field on the wire
#[inline]
pub(crate) fn binary_len(data: &[u8]) -> usize {
    2 + data.len()
}

/// Copy a decoded field out of the read buffer
#[inline]
pub(crate) fn to_bytes(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(data)
}
