use crate::Cause;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PfcpError {
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    #[error("{field} length {length} exceeds capacity {capacity}")]
    FieldTooLong {
        field: &'static str,
        length: usize,
        capacity: usize,
    },

    #[error("Invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u32 },

    #[error("Inconsistent address flags in {0}")]
    InconsistentAddressFlags(&'static str),

    #[error("Missing mandatory IE: {0}")]
    MissingMandatoryIe(&'static str),

    #[error("Unknown message type {0}")]
    UnknownMessageType(u8),

    #[error("PFCP version {0} not supported")]
    VersionNotSupported(u8),

    #[error("Invalid header: {0}")]
    InvalidHeader(&'static str),
}

impl PfcpError {
    /// The cause code to signal back to the peer when this error rejects a request.
    pub fn cause(&self) -> Cause {
        match self {
            PfcpError::BufferTooShort { .. } | PfcpError::FieldTooLong { .. } => {
                Cause::InvalidLength
            }
            PfcpError::InvalidValue { .. } | PfcpError::InconsistentAddressFlags(_) => {
                Cause::MandatoryIeIncorrect
            }
            PfcpError::MissingMandatoryIe(_) => Cause::MandatoryIeMissing,
            PfcpError::UnknownMessageType(_) => Cause::ServiceNotSupported,
            PfcpError::VersionNotSupported(_) | PfcpError::InvalidHeader(_) => {
                Cause::RequestRejected
            }
        }
    }
}

pub type PfcpResult<T> = Result<T, PfcpError>;
