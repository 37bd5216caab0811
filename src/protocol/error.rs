//! CONNECT codec error types

use std::fmt;

/// What went wrong while encoding, decoding or validating a CONNECT packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Variable header ended before all four fields were read
    TruncatedHeader,
    /// Length prefix exceeds the buffer, or text is not valid UTF-8
    MalformedString,
    /// Bit 0 of the connect flags is set
    ReservedBitSet,
    /// Will QoS bits hold a value above 2
    InvalidWillQoS(u8),
    /// Payload ended before the client identifier
    MissingClientId,
    /// Will flag is set but will topic or message is absent
    MissingWillPayload,
    /// Will topic or message is present but the will flag is clear
    UnexpectedWillPayload,
    /// Username flag is set but no username is present
    MissingUsername,
    /// Username is present but the username flag is clear
    UnexpectedUsername,
    /// Password flag is set but no password is present
    MissingPassword,
    /// Password is present but the password flag is clear
    UnexpectedPassword,
    /// Password flag is set while the username flag is clear
    PasswordWithoutUsername,
    /// Field does not fit a two byte length prefix
    StringTooLong,
    /// Bytes remain after the last field implied by the flags
    TrailingData(usize),
    /// Cross-field invariant violation not covered by a more specific kind
    Validation(&'static str),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader => write!(f, "truncated variable header"),
            Self::MalformedString => write!(f, "malformed length-prefixed string"),
            Self::ReservedBitSet => write!(f, "reserved connect flag bit is set"),
            Self::InvalidWillQoS(q) => write!(f, "invalid will QoS: {}", q),
            Self::MissingClientId => write!(f, "client identifier missing"),
            Self::MissingWillPayload => write!(f, "will flag set but will topic/message missing"),
            Self::UnexpectedWillPayload => {
                write!(f, "will topic/message present but will flag clear")
            }
            Self::MissingUsername => write!(f, "username flag set but username missing"),
            Self::UnexpectedUsername => write!(f, "username present but username flag clear"),
            Self::MissingPassword => write!(f, "password flag set but password missing"),
            Self::UnexpectedPassword => write!(f, "password present but password flag clear"),
            Self::PasswordWithoutUsername => write!(f, "password flag set without username flag"),
            Self::StringTooLong => write!(f, "field exceeds 65535 bytes"),
            Self::TrailingData(n) => write!(f, "{} trailing bytes after payload", n),
            Self::Validation(msg) => write!(f, "invalid connect packet: {}", msg),
        }
    }
}

/// Stage of processing that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Protocol name, level, flags or keep alive
    Header,
    /// Client identifier, will, username or password
    Payload,
    /// Whole-packet invariant check
    Validation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Payload => write!(f, "payload"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Error returned by every CONNECT encode, decode and build entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectError {
    phase: Phase,
    kind: ErrorKind,
}

impl ConnectError {
    pub fn new(phase: Phase, kind: ErrorKind) -> Self {
        Self { phase, kind }
    }

    pub fn header(kind: ErrorKind) -> Self {
        Self::new(Phase::Header, kind)
    }

    pub fn payload(kind: ErrorKind) -> Self {
        Self::new(Phase::Payload, kind)
    }

    pub fn validation(kind: ErrorKind) -> Self {
        Self::new(Phase::Validation, kind)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.phase, self.kind)
    }
}

impl std::error::Error for ConnectError {}
