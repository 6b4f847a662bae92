//! Object runtime errors.
//!
//! Every invariant violation in this layer (bad cast, ref-count
//! underflow, unknown type name, stream corruption) reports loudly with
//! enough context to diagnose. Nothing here degrades to a best guess.

use alloc::string::String;

use crate::stream::StreamError;

/// Errors raised by the object runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// A null source was handed to a type-checked operation.
    NullSource,
    /// A downcast or duplication targeted an incompatible type.
    BadCast {
        /// Type the caller expected.
        expected: &'static str,
        /// Runtime type actually present.
        actual: &'static str,
    },
    /// A reference count was decremented below zero.
    RefCountUnderflow,
    /// No factory is registered under this type name.
    UnknownType(String),
    /// A stream-level failure while reading or writing an object.
    Stream(StreamError),
}

impl core::fmt::Display for ObjectError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ObjectError::NullSource => write!(f, "null source object"),
            ObjectError::BadCast { expected, actual } => {
                write!(f, "bad cast: expected '{}', actual '{}'", expected, actual)
            }
            ObjectError::RefCountUnderflow => write!(f, "reference count underflow"),
            ObjectError::UnknownType(name) => {
                write!(f, "no factory registered for type '{}'", name)
            }
            ObjectError::Stream(err) => write!(f, "stream error: {}", err),
        }
    }
}

impl From<StreamError> for ObjectError {
    fn from(err: StreamError) -> Self {
        ObjectError::Stream(err)
    }
}

/// Result alias for object runtime operations.
pub type ObjResult<T> = core::result::Result<T, ObjectError>;
