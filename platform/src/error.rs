//! Kernel-level error carrier.
//!
//! Every resource failure in the platform layer surfaces a framework
//! severity/class pair plus the platform-native error code, so higher
//! layers can translate into their own error objects without losing
//! the native code for diagnostics.

use core::fmt;

/// Platform-native error code attached to resource failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OsCode(pub u32);

impl OsCode {
    /// No native code available for this failure.
    pub const NONE: OsCode = OsCode(0);
}

/// Native error codes the platform layer itself raises.
pub mod oscodes {
    /// No underlying OS error.
    pub const NONE: u32 = 0;
    /// Named resource does not exist.
    pub const NOT_FOUND: u32 = 2;
    /// Access rights do not permit the operation.
    pub const ACCESS_DENIED: u32 = 5;
    /// Operation attempted through an invalid handle.
    pub const INVALID_HANDLE: u32 = 6;
    /// Named resource already exists.
    pub const ALREADY_EXISTS: u32 = 183;
    /// A bounded wait expired.
    pub const TIMED_OUT: u32 = 1460;
    /// Offset or count outside the resource's range.
    pub const OUT_OF_RANGE: u32 = 1735;
}

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational, no operation failed.
    Info,
    /// Operation succeeded with caveats.
    Warn,
    /// The local operation failed.
    Failed,
    /// The process cannot reasonably continue.
    ProcFatal,
}

/// Error class, the second half of the severity/class pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrClass {
    /// The operation cannot be performed on this object.
    CantDo,
    /// The object is not in a state that allows the operation.
    NotReady,
    /// An index or offset was out of range.
    Index,
    /// The named resource already exists.
    AlreadyExists,
    /// The named resource was not found.
    NotFound,
    /// A wait expired (only used where timeout is exceptional).
    Timeout,
    /// Malformed parameters, reported before any OS resource is touched.
    BadParms,
    /// The host platform does not support the operation.
    NotSupported,
    /// A counter would go below zero.
    Underflow,
    /// The resource is held by another owner.
    InUse,
}

/// Kernel error: severity/class pair plus the native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelError {
    /// Error severity.
    pub severity: Severity,
    /// Error class.
    pub class: ErrClass,
    /// Platform-native error code, `OsCode::NONE` if none applies.
    pub os_code: OsCode,
}

impl KernelError {
    /// Create an error with an explicit severity.
    pub const fn new(severity: Severity, class: ErrClass, os_code: OsCode) -> Self {
        KernelError {
            severity,
            class,
            os_code,
        }
    }

    /// Create a `Failed` error, the common case.
    pub const fn failed(class: ErrClass, os_code: OsCode) -> Self {
        KernelError::new(Severity::Failed, class, os_code)
    }

    /// Named resource not found.
    pub const fn not_found() -> Self {
        KernelError::failed(ErrClass::NotFound, OsCode(oscodes::NOT_FOUND))
    }

    /// Named resource already exists.
    pub const fn already_exists() -> Self {
        KernelError::failed(ErrClass::AlreadyExists, OsCode(oscodes::ALREADY_EXISTS))
    }

    /// Operation attempted through an invalid or closed handle.
    pub const fn invalid_handle() -> Self {
        KernelError::failed(ErrClass::CantDo, OsCode(oscodes::INVALID_HANDLE))
    }

    /// Access rights do not permit the operation.
    pub const fn access_denied() -> Self {
        KernelError::failed(ErrClass::CantDo, OsCode(oscodes::ACCESS_DENIED))
    }

    /// Malformed parameters.
    pub const fn bad_parms() -> Self {
        KernelError::failed(ErrClass::BadParms, OsCode::NONE)
    }

    /// Object not in the right state for the operation.
    pub const fn not_ready() -> Self {
        KernelError::failed(ErrClass::NotReady, OsCode::NONE)
    }

    /// Offset or count out of range.
    pub const fn index_range() -> Self {
        KernelError::failed(ErrClass::Index, OsCode(oscodes::OUT_OF_RANGE))
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?} (os code {})",
            self.severity, self.class, self.os_code.0
        )
    }
}

/// Result type for platform operations.
pub type Result<T> = core::result::Result<T, KernelError>;
