//! Error types for accelerated

use thiserror::Error;

/// Result type alias using accelerated's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up, running or releasing a backend
#[derive(Error, Debug)]
pub enum Error {
    /// No compute device could be acquired
    #[error("No suitable compute device found: {reason}")]
    NoDevice {
        /// Why enumeration failed
        reason: String,
    },

    /// Context, queue or kernel compilation failure during setup
    #[error("Setup failed during '{stage}': {reason}")]
    Setup {
        /// Setup stage that failed (e.g. "request_device", "compile")
        stage: &'static str,
        /// Device-reported reason
        reason: String,
    },

    /// Requested backend is not compiled into this build
    #[error("Backend '{backend}' is unavailable: enable the '{feature}' feature")]
    BackendUnavailable {
        /// Backend name
        backend: &'static str,
        /// Cargo feature that provides it
        feature: &'static str,
    },

    /// A slice argument has the wrong length
    #[error("Invalid argument '{arg}' for '{op}': expected length {expected}, got {got}")]
    LengthMismatch {
        /// The operation being attempted
        op: &'static str,
        /// The argument name
        arg: &'static str,
        /// Expected element count
        expected: usize,
        /// Actual element count
        got: usize,
    },

    /// A dimension product overflows the address space
    #[error("Dimensions too large for '{op}': n={n}, d={d}")]
    DimensionOverflow {
        /// The operation being attempted
        op: &'static str,
        /// Input dimension
        n: usize,
        /// Output dimension
        d: usize,
    },

    /// Device buffer allocation failed
    #[error("Out of device memory: failed to allocate buffer '{tag}' of {len} elements: {reason}")]
    OutOfMemory {
        /// Logical buffer tag
        tag: &'static str,
        /// Requested element count
        len: usize,
        /// Device-reported reason
        reason: String,
    },

    /// Host/device copy failed
    #[error("Transfer '{op}' of buffer '{tag}' ({len} elements) failed: {reason}")]
    Transfer {
        /// Direction of the copy ("write" or "read")
        op: &'static str,
        /// Logical buffer tag
        tag: &'static str,
        /// Element count involved
        len: usize,
        /// Device-reported reason
        reason: String,
    },

    /// Kernel dispatch or execution failed
    #[error("Kernel '{kernel}' failed (n={n}, d={d}): {reason}")]
    Compute {
        /// Kernel entry point
        kernel: &'static str,
        /// Input dimension
        n: usize,
        /// Output dimension
        d: usize,
        /// Device-reported reason
        reason: String,
    },

    /// Freeing a buffer or the device session failed
    #[error("Release of {resource} failed: {reason}")]
    Release {
        /// What was being released
        resource: String,
        /// Device-reported reason
        reason: String,
    },

    /// Operation called without a live device session
    #[error("Backend not initialized: '{op}' requires a successful setup_context")]
    NotInitialized {
        /// The operation being attempted
        op: &'static str,
    },

    /// `setup_context` called on a backend that already owns a session
    #[error("Backend already initialized")]
    AlreadyInitialized,
}

/// Coarse classification of [`Error`] following the failure taxonomy of the backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fatal: abort startup, never retry
    Setup,
    /// Caller bug, rejected before any device interaction
    Validation,
    /// Device memory exhausted
    Resource,
    /// Host/device copy failure
    Transfer,
    /// Kernel failure
    Compute,
    /// Best-effort teardown failure
    Release,
    /// Operation called in the wrong lifecycle state
    Lifecycle,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice { .. } | Self::Setup { .. } | Self::BackendUnavailable { .. } => {
                ErrorKind::Setup
            }
            Self::LengthMismatch { .. } | Self::DimensionOverflow { .. } => ErrorKind::Validation,
            Self::OutOfMemory { .. } => ErrorKind::Resource,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Compute { .. } => ErrorKind::Compute,
            Self::Release { .. } => ErrorKind::Release,
            Self::NotInitialized { .. } | Self::AlreadyInitialized => ErrorKind::Lifecycle,
        }
    }

    /// Create a setup error
    pub fn setup(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Setup {
            stage,
            reason: reason.into(),
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(
        op: &'static str,
        arg: &'static str,
        expected: usize,
        got: usize,
    ) -> Self {
        Self::LengthMismatch {
            op,
            arg,
            expected,
            got,
        }
    }

    /// Create an allocation failure
    pub fn out_of_memory(tag: &'static str, len: usize, reason: impl Into<String>) -> Self {
        Self::OutOfMemory {
            tag,
            len,
            reason: reason.into(),
        }
    }

    /// Create a transfer failure
    pub fn transfer(
        op: &'static str,
        tag: &'static str,
        len: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            op,
            tag,
            len,
            reason: reason.into(),
        }
    }

    /// Create a kernel failure
    pub fn compute(kernel: &'static str, n: usize, d: usize, reason: impl Into<String>) -> Self {
        Self::Compute {
            kernel,
            n,
            d,
            reason: reason.into(),
        }
    }

    /// Create a release failure
    pub fn release(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Release {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}
