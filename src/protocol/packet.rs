//! CONNECT packet entity
//!
//! `ConnectPacket` can only be obtained through `ConnectPacket::build` (directly,
//! via `ConnectBuilder`, or via `ConnectPacket::decode`), so every instance
//! satisfies the flag/payload invariants. There is no raw flags setter.

use bytes::{Bytes, BytesMut};

use super::{
    ConnectError, ConnectFlags, ErrorKind, ProtocolVersion, QoS, DEFAULT_PROTOCOL_LEVEL,
    PROTOCOL_NAME,
};
use crate::codec::{Payload, Reader, VariableHeader, MAX_STRING_LEN};

/// Unvalidated CONNECT field set
///
/// Mirrors the wire layout one field per flag bit, so inconsistent
/// combinations can be expressed here and are rejected by `ConnectPacket::build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFields {
    pub protocol_name: String,
    pub protocol_level: u8,
    /// Reserved flag bit, must be false
    pub reserved: bool,
    pub clean_session: bool,
    pub will_flag: bool,
    /// Raw will QoS (0-2 are valid)
    pub will_qos: u8,
    pub will_retain: bool,
    pub username_flag: bool,
    pub password_flag: bool,
    /// Keep alive interval in seconds (0 = disabled)
    pub keep_alive: u16,
    pub client_id: Bytes,
    pub will_topic: Option<Bytes>,
    pub will_message: Option<Bytes>,
    pub username: Option<Bytes>,
    pub password: Option<Bytes>,
}

impl Default for ConnectFields {
    fn default() -> Self {
        Self {
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_level: DEFAULT_PROTOCOL_LEVEL,
            reserved: false,
            clean_session: true,
            will_flag: false,
            will_qos: 0,
            will_retain: false,
            username_flag: false,
            password_flag: false,
            keep_alive: 60,
            client_id: Bytes::new(),
            will_topic: None,
            will_message: None,
            username: None,
            password: None,
        }
    }
}

/// Last will carried by a CONNECT packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: Bytes,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// Validated CONNECT packet (variable header + payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    header: VariableHeader,
    payload: Payload,
}

impl ConnectPacket {
    pub fn builder(client_id: impl Into<Bytes>) -> ConnectBuilder {
        ConnectBuilder::new(client_id)
    }

    /// Validate `fields` as a whole and construct the packet
    pub fn build(fields: ConnectFields) -> Result<Self, ConnectError> {
        let flags = validate(&fields).map_err(ConnectError::validation)?;

        Ok(Self {
            header: VariableHeader {
                protocol_name: fields.protocol_name,
                protocol_level: fields.protocol_level,
                flags,
                keep_alive: fields.keep_alive,
            },
            payload: Payload {
                client_id: fields.client_id,
                will_topic: fields.will_topic,
                will_message: fields.will_message,
                username: fields.username,
                password: fields.password,
            },
        })
    }

    /// Decode a CONNECT body (everything after the fixed header)
    pub fn decode(buf: &[u8]) -> Result<Self, ConnectError> {
        let mut reader = Reader::new(buf);
        let header = VariableHeader::read(&mut reader)?;
        let payload = Payload::read(&mut reader, &header.flags)?;
        Self::build(Self::assemble(header, payload))
    }

    /// Encode the CONNECT body (everything after the fixed header)
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ConnectError> {
        validate(&self.fields()).map_err(ConnectError::validation)?;

        buf.reserve(self.encoded_len());
        self.header.encode(buf)?;
        self.payload.encode(&self.header.flags, buf)
    }

    /// Length of the CONNECT body, i.e. the fixed header's remaining length
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len() + self.payload.encoded_len()
    }

    pub fn fields(&self) -> ConnectFields {
        Self::assemble(self.header.clone(), self.payload.clone())
    }

    pub fn into_fields(self) -> ConnectFields {
        Self::assemble(self.header, self.payload)
    }

    fn assemble(header: VariableHeader, payload: Payload) -> ConnectFields {
        let flags = header.flags;
        ConnectFields {
            protocol_name: header.protocol_name,
            protocol_level: header.protocol_level,
            reserved: false,
            clean_session: flags.clean_session,
            will_flag: flags.will,
            will_qos: flags.will_qos as u8,
            will_retain: flags.will_retain,
            username_flag: flags.username,
            password_flag: flags.password,
            keep_alive: header.keep_alive,
            client_id: payload.client_id,
            will_topic: payload.will_topic,
            will_message: payload.will_message,
            username: payload.username,
            password: payload.password,
        }
    }

    pub fn protocol_name(&self) -> &str {
        &self.header.protocol_name
    }

    pub fn protocol_level(&self) -> u8 {
        self.header.protocol_level
    }

    /// Named protocol version, if the level is one this crate knows about
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_u8(self.header.protocol_level)
    }

    pub fn flags(&self) -> ConnectFlags {
        self.header.flags
    }

    /// Packed connect flags byte
    pub fn connect_flags(&self) -> u8 {
        self.header.flags.to_byte()
    }

    pub fn clean_session(&self) -> bool {
        self.header.flags.clean_session
    }

    pub fn keep_alive(&self) -> u16 {
        self.header.keep_alive
    }

    pub fn client_id(&self) -> &Bytes {
        &self.payload.client_id
    }

    pub fn will_flag(&self) -> bool {
        self.header.flags.will
    }

    pub fn will_qos(&self) -> QoS {
        self.header.flags.will_qos
    }

    pub fn will_retain(&self) -> bool {
        self.header.flags.will_retain
    }

    pub fn will_topic(&self) -> Option<&Bytes> {
        self.payload.will_topic.as_ref()
    }

    pub fn will_message(&self) -> Option<&Bytes> {
        self.payload.will_message.as_ref()
    }

    pub fn will(&self) -> Option<Will> {
        match (&self.payload.will_topic, &self.payload.will_message) {
            (Some(topic), Some(message)) => Some(Will {
                topic: topic.clone(),
                message: message.clone(),
                qos: self.header.flags.will_qos,
                retain: self.header.flags.will_retain,
            }),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&Bytes> {
        self.payload.username.as_ref()
    }

    pub fn password(&self) -> Option<&Bytes> {
        self.payload.password.as_ref()
    }
}

/// Check every invariant across the whole field set.
/// Returns the typed flags on success.
fn validate(fields: &ConnectFields) -> Result<ConnectFlags, ErrorKind> {
    if fields.reserved {
        return Err(ErrorKind::ReservedBitSet);
    }

    // Presence before will QoS/retain
    let flags = ConnectFlags {
        clean_session: fields.clean_session,
        will: fields.will_flag,
        will_qos: QoS::AtMostOnce,
        will_retain: fields.will_retain,
        password: fields.password_flag,
        username: fields.username_flag,
    };
    let payload = Payload {
        client_id: Bytes::new(),
        will_topic: fields.will_topic.clone(),
        will_message: fields.will_message.clone(),
        username: fields.username.clone(),
        password: fields.password.clone(),
    };
    payload.check_presence(&flags)?;

    let will_qos =
        QoS::from_u8(fields.will_qos).ok_or(ErrorKind::InvalidWillQoS(fields.will_qos))?;
    if !fields.will_flag {
        if will_qos != QoS::AtMostOnce {
            return Err(ErrorKind::Validation("will QoS must be 0 when will flag is clear"));
        }
        if fields.will_retain {
            return Err(ErrorKind::Validation(
                "will retain must be 0 when will flag is clear",
            ));
        }
    }

    let too_long = fields.protocol_name.len() > MAX_STRING_LEN
        || fields.client_id.len() > MAX_STRING_LEN
        || [
            &fields.will_topic,
            &fields.will_message,
            &fields.username,
            &fields.password,
        ]
        .into_iter()
        .flatten()
        .any(|field| field.len() > MAX_STRING_LEN);
    if too_long {
        return Err(ErrorKind::StringTooLong);
    }

    Ok(ConnectFlags { will_qos, ..flags })
}

/// Builds a `ConnectPacket` from named options
///
/// Each option sets a field together with its flag bit, so the builder can only
/// produce flag/payload mismatches through conflicting calls, which `build` rejects.
#[derive(Debug, Clone)]
pub struct ConnectBuilder {
    fields: ConnectFields,
}

impl ConnectBuilder {
    pub fn new(client_id: impl Into<Bytes>) -> Self {
        Self {
            fields: ConnectFields {
                client_id: client_id.into(),
                ..Default::default()
            },
        }
    }

    /// Protocol name and level written to the variable header
    pub fn protocol(mut self, name: impl Into<String>, level: u8) -> Self {
        self.fields.protocol_name = name.into();
        self.fields.protocol_level = level;
        self
    }

    pub fn version(self, version: ProtocolVersion) -> Self {
        self.protocol(version.protocol_name(), version as u8)
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.fields.clean_session = clean_session;
        self
    }

    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.fields.keep_alive = seconds;
        self
    }

    pub fn will(
        mut self,
        topic: impl Into<Bytes>,
        message: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Self {
        self.fields.will_flag = true;
        self.fields.will_topic = Some(topic.into());
        self.fields.will_message = Some(message.into());
        self.fields.will_qos = qos as u8;
        self.fields.will_retain = retain;
        self
    }

    pub fn username(mut self, username: impl Into<Bytes>) -> Self {
        self.fields.username_flag = true;
        self.fields.username = Some(username.into());
        self
    }

    pub fn credentials(self, username: impl Into<Bytes>, password: impl Into<Bytes>) -> Self {
        let mut builder = self.username(username);
        builder.fields.password_flag = true;
        builder.fields.password = Some(password.into());
        builder
    }

    pub fn build(self) -> Result<ConnectPacket, ConnectError> {
        ConnectPacket::build(self.fields)
    }
}
