//! CONNECT payload
//!
//! Client identifier, then will topic and will message, username and
//! password, each present only when the matching flag is set. The flags must
//! be known before the payload can be read.

use bytes::{Bytes, BytesMut};

use super::{binary_len, to_bytes, write_binary, Reader};
use crate::protocol::{ConnectError, ConnectFlags, ErrorKind};

/// Payload fields, each a raw length-prefixed byte string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub client_id: Bytes,
    pub will_topic: Option<Bytes>,
    pub will_message: Option<Bytes>,
    pub username: Option<Bytes>,
    pub password: Option<Bytes>,
}

impl Payload {
    /// Decode a payload that extends to the end of `buf`
    pub fn decode(buf: &[u8], flags: &ConnectFlags) -> Result<Self, ConnectError> {
        let mut reader = Reader::new(buf);
        Self::read(&mut reader, flags)
    }

    pub(crate) fn read(reader: &mut Reader<'_>, flags: &ConnectFlags) -> Result<Self, ConnectError> {
        // [MQTT-3.1.2-22] checked up front, whatever the payload holds
        if flags.password && !flags.username {
            return Err(ConnectError::payload(ErrorKind::PasswordWithoutUsername));
        }

        let client_id = read_field(reader, ErrorKind::MissingClientId)?;

        let (will_topic, will_message) = if flags.will {
            let topic = read_field(reader, ErrorKind::MissingWillPayload)?;
            let message = read_field(reader, ErrorKind::MissingWillPayload)?;
            (Some(topic), Some(message))
        } else {
            (None, None)
        };

        let username = if flags.username {
            Some(read_field(reader, ErrorKind::MissingUsername)?)
        } else {
            None
        };

        let password = if flags.password {
            Some(read_field(reader, ErrorKind::MissingPassword)?)
        } else {
            None
        };

        let leftover = reader.remaining();
        if leftover > 0 {
            return Err(ConnectError::payload(unexpected_after(flags, leftover)));
        }

        Ok(Self {
            client_id,
            will_topic,
            will_message,
            username,
            password,
        })
    }

    /// Encode the fields implied by `flags`
    ///
    /// Fails without writing anything if the present fields disagree with the flags.
    pub fn encode(&self, flags: &ConnectFlags, buf: &mut BytesMut) -> Result<(), ConnectError> {
        self.check_presence(flags).map_err(ConnectError::payload)?;

        let mut out = BytesMut::with_capacity(self.encoded_len());
        let fields = [
            Some(&self.client_id),
            self.will_topic.as_ref(),
            self.will_message.as_ref(),
            self.username.as_ref(),
            self.password.as_ref(),
        ];
        for field in fields.into_iter().flatten() {
            write_binary(&mut out, field).map_err(ConnectError::payload)?;
        }

        buf.extend_from_slice(&out);
        Ok(())
    }

    /// Number of bytes `encode` writes
    pub fn encoded_len(&self) -> usize {
        binary_len(&self.client_id)
            + self.will_topic.as_deref().map_or(0, binary_len)
            + self.will_message.as_deref().map_or(0, binary_len)
            + self.username.as_deref().map_or(0, binary_len)
            + self.password.as_deref().map_or(0, binary_len)
    }

    /// Check that exactly the fields implied by `flags` are present
    pub fn check_presence(&self, flags: &ConnectFlags) -> Result<(), ErrorKind> {
        if flags.password && !flags.username {
            return Err(ErrorKind::PasswordWithoutUsername);
        }

        let will_present = self.will_topic.is_some() || self.will_message.is_some();
        if flags.will && (self.will_topic.is_none() || self.will_message.is_none()) {
            return Err(ErrorKind::MissingWillPayload);
        }
        if !flags.will && will_present {
            return Err(ErrorKind::UnexpectedWillPayload);
        }

        match (flags.username, self.username.is_some()) {
            (true, false) => return Err(ErrorKind::MissingUsername),
            (false, true) => return Err(ErrorKind::UnexpectedUsername),
            _ => {}
        }

        match (flags.password, self.password.is_some()) {
            (true, false) => return Err(ErrorKind::MissingPassword),
            (false, true) => return Err(ErrorKind::UnexpectedPassword),
            _ => {}
        }

        Ok(())
    }
}

fn read_field(reader: &mut Reader<'_>, missing: ErrorKind) -> Result<Bytes, ConnectError> {
    if reader.remaining() == 0 {
        return Err(ConnectError::payload(missing));
    }
    let data = reader.read_binary().map_err(ConnectError::payload)?;
    Ok(to_bytes(data))
}

/// Classify bytes found after the last field the flags asked for.
///
/// They occupy the first flag-clear slot after the last field that was read.
fn unexpected_after(flags: &ConnectFlags, leftover: usize) -> ErrorKind {
    if flags.password {
        ErrorKind::TrailingData(leftover)
    } else if flags.username {
        ErrorKind::UnexpectedPassword
    } else if flags.will {
        ErrorKind::UnexpectedUsername
    } else {
        ErrorKind::UnexpectedWillPayload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Phase;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn flags(will: bool, username: bool, password: bool) -> ConnectFlags {
        ConnectFlags {
            clean_session: true,
            will,
            username,
            password,
            ..Default::default()
        }
    }

    fn full_payload() -> Payload {
        Payload {
            client_id: Bytes::from_static(b"dev-1"),
            will_topic: Some(Bytes::from_static(b"dev/1/status")),
            will_message: Some(Bytes::from_static(b"offline")),
            username: Some(Bytes::from_static(b"alice")),
            password: Some(Bytes::from_static(b"s3cret")),
        }
    }

    #[test]
    fn test_field_order() {
        let mut buf = BytesMut::new();
        full_payload()
            .encode(&flags(true, true, true), &mut buf)
            .unwrap();

        let mut expected = Vec::new();
        let fields: [&[u8]; 5] = [b"dev-1", b"dev/1/status", b"offline", b"alice", b"s3cret"];
        for field in fields {
            expected.extend_from_slice(&(field.len() as u16).to_be_bytes());
            expected.extend_from_slice(field);
        }
        assert_eq!(&buf[..], &expected[..]);
        assert_eq!(full_payload().encoded_len(), expected.len());

        let decoded = Payload::decode(&buf, &flags(true, true, true)).unwrap();
        assert_eq!(decoded, full_payload());
    }

    #[test]
    fn test_empty_client_id_allowed() {
        let decoded = Payload::decode(&[0x00, 0x00], &flags(false, false, false)).unwrap();
        assert!(decoded.client_id.is_empty());
    }

    #[test]
    fn test_client_id_not_utf8_checked() {
        let decoded = Payload::decode(&[0x00, 0x02, 0xFF, 0xFE], &flags(false, false, false)).unwrap();
        assert_eq!(&decoded.client_id[..], &[0xFF, 0xFE]);
    }

    #[test_case(&[], ErrorKind::MissingClientId ; "empty payload")]
    #[test_case(&[0x00], ErrorKind::MalformedString ; "half a length prefix")]
    #[test_case(&[0x00, 0x05, b'd', b'e'], ErrorKind::MalformedString ; "length overrun")]
    fn test_client_id_errors(bytes: &[u8], kind: ErrorKind) {
        let err = Payload::decode(bytes, &flags(false, false, false)).unwrap_err();
        assert_eq!(err, ConnectError::payload(kind));
    }

    #[test]
    fn test_missing_will_message() {
        // client id + will topic only
        let bytes = [0x00, 0x01, b'c', 0x00, 0x01, b't'];
        let err = Payload::decode(&bytes, &flags(true, false, false)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingWillPayload);
    }

    #[test]
    fn test_missing_username() {
        let bytes = [0x00, 0x01, b'c'];
        let err = Payload::decode(&bytes, &flags(false, true, false)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingUsername);
    }

    #[test]
    fn test_missing_password() {
        let bytes = [0x00, 0x01, b'c', 0x00, 0x01, b'u'];
        let err = Payload::decode(&bytes, &flags(false, true, true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingPassword);
    }

    #[test]
    fn test_password_without_username_ignores_content() {
        let cases: [&[u8]; 3] = [&[], &[0x00, 0x01, b'c'], &[0x00, 0x01, b'c', 0x00, 0x01, b'p']];
        for bytes in cases {
            let err = Payload::decode(bytes, &flags(false, false, true)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PasswordWithoutUsername);
            assert_eq!(err.phase(), Phase::Payload);
        }
    }

    #[test_case(false, false, false, ErrorKind::UnexpectedWillPayload ; "after client id")]
    #[test_case(true, false, false, ErrorKind::UnexpectedUsername ; "after will")]
    #[test_case(false, true, false, ErrorKind::UnexpectedPassword ; "after username")]
    #[test_case(true, true, true, ErrorKind::TrailingData(3) ; "after password")]
    fn test_leftover_bytes(will: bool, username: bool, password: bool, kind: ErrorKind) {
        let flags = flags(will, username, password);
        let mut payload = full_payload();
        if !will {
            payload.will_topic = None;
            payload.will_message = None;
        }
        if !username {
            payload.username = None;
        }
        if !password {
            payload.password = None;
        }
        let mut buf = BytesMut::new();
        payload.encode(&flags, &mut buf).unwrap();
        buf.extend_from_slice(&[0x00, 0x01, b'x']);

        let err = Payload::decode(&buf, &flags).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_encode_rejects_unexpected_will() {
        let mut payload = full_payload();
        payload.username = None;
        payload.password = None;
        let mut buf = BytesMut::new();
        let err = payload
            .encode(&flags(false, false, false), &mut buf)
            .unwrap_err();
        assert_eq!(err, ConnectError::payload(ErrorKind::UnexpectedWillPayload));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_rejects_half_will() {
        let mut payload = full_payload();
        payload.will_message = None;
        let err = payload
            .encode(&flags(true, true, true), &mut BytesMut::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingWillPayload);
    }

    #[test]
    fn test_encode_credentials_mismatch() {
        let payload = full_payload();
        let err = payload
            .check_presence(&flags(true, false, false))
            .unwrap_err();
        assert_eq!(err, ErrorKind::UnexpectedUsername);

        let err = payload.check_presence(&flags(true, true, false)).unwrap_err();
        assert_eq!(err, ErrorKind::UnexpectedPassword);

        let mut payload = full_payload();
        payload.password = None;
        let err = payload.check_presence(&flags(true, true, true)).unwrap_err();
        assert_eq!(err, ErrorKind::MissingPassword);
    }

    #[test]
    fn test_encode_string_too_long() {
        let payload = Payload {
            client_id: Bytes::from(vec![b'a'; 65_536]),
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        let err = payload
            .encode(&flags(false, false, false), &mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StringTooLong);
        assert!(buf.is_empty());
    }
}
