use thiserror::Error;

use crate::constant_pool;

#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Invalid magic identifier: 0x{0:X}")]
    InvalidMagicIdentifier(u32),
    #[error("Invalid cp info tag: {0}")]
    InvalidCpInfoTag(u8),
    #[error("Invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Expected {0}, found {1:?}")]
    UnexpectedConstantPoolEntry(&'static str, constant_pool::CpInfo),
    #[error("{name} attribute declares {declared} bytes but only {consumed} were read")]
    AttributeLengthMismatch {
        name: &'static str,
        declared: u32,
        consumed: u64,
    },
    #[error("{name} attribute reads past its declared length of {declared} bytes")]
    AttributeOverrun { name: &'static str, declared: u32 },
    #[error("Invalid element value tag: {0:?}")]
    InvalidElementValueTag(char),
    #[error("Invalid stack map frame type: {0}")]
    InvalidStackMapFrameType(u8),
    #[error("Invalid verification type tag: {0}")]
    InvalidVerificationTypeTag(u8),
    #[error("Invalid type annotation target type: 0x{0:02X}")]
    InvalidTargetType(u8),
    #[error("Invalid descriptor: {0:?}")]
    InvalidDescriptor(String),
    #[error("{source} (at offset {offset})")]
    AtOffset {
        offset: u64,
        #[source]
        source: Box<ClassFileError>,
    },
}

impl ClassFileError {
    pub(crate) fn at(self, offset: u64) -> Self {
        match self {
            e @ ClassFileError::AtOffset { .. } => e,
            e => ClassFileError::AtOffset {
                offset,
                source: Box::new(e),
            },
        }
    }

    /// Byte offset of the record that failed to decode, when known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ClassFileError::AtOffset { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// The error with any offset information stripped.
    pub fn cause(&self) -> &ClassFileError {
        match self {
            ClassFileError::AtOffset { source, .. } => source.cause(),
            e => e,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(
            self.cause(),
            ClassFileError::IOError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}
