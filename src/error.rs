//! Failure kinds shared by [`Session`](crate::session::Session) and
//! [`Runner`](crate::pipeline::Runner).
//!
//! The enumeration is flat on purpose: callers match on a single value no
//! matter which layer produced it.  "No error" is spelled `None` wherever an
//! `Option<ErrorKind>` is stored.
//!
//! | Category      | Returned by                 | Variants                                          |
//! |---------------|-----------------------------|---------------------------------------------------|
//! | Configuration | `Session::init`, `Runner::start` | `UndefinedFiles`, `UndefinedConfig`, `UndefinedQueue` |
//! | Acquisition   | `Session::init`             | `UserDirMake` … `DecoderCreate`                   |
//! | Runtime       | `Runner::last_error`        | `RecStart` … `AudioRead`                          |

use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Coarse grouping of [`ErrorKind`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Something the caller forgot to set up.
    Configuration,
    /// Opening or staging a resource failed inside `Session::init`.
    Acquisition,
    /// The capture/decode loop stopped because of a device or decoder failure.
    Runtime,
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Every failure the session and runner can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// One or more of the model directory, dictionary or keyword-list paths
    /// was never set.
    #[error("one or more file/directory names aren't defined")]
    UndefinedFiles,

    /// The runner has no session attached, or the session is not initialised.
    #[error("undefined session configuration")]
    UndefinedConfig,

    /// The runner has no keyword queue attached.
    #[error("undefined keyword queue")]
    UndefinedQueue,

    #[error("couldn't create the staging directory")]
    UserDirMake,

    #[error("couldn't copy model files into the staging directory")]
    UserDirCopy,

    /// A staged path could not be represented as a UTF-8 string.
    #[error("couldn't convert a filename to a valid string")]
    MultibyteStr,

    #[error("no memory available for allocation")]
    MemAlloc,

    #[error("couldn't create the speech engine configuration")]
    ConfigCreate,

    #[error("couldn't open audio device (microphone)")]
    AudioDeviceOpen,

    #[error("couldn't create the keyword decoder")]
    DecoderCreate,

    #[error("couldn't start recording")]
    RecStart,

    #[error("couldn't stop recording")]
    RecStop,

    #[error("couldn't start utterance")]
    UttStart,

    #[error("couldn't restart utterance")]
    UttRestart,

    #[error("error while reading data from the audio device")]
    AudioRead,
}

impl ErrorKind {
    /// All variants in code order.
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::UndefinedFiles,
        ErrorKind::UndefinedConfig,
        ErrorKind::UndefinedQueue,
        ErrorKind::UserDirMake,
        ErrorKind::UserDirCopy,
        ErrorKind::MultibyteStr,
        ErrorKind::MemAlloc,
        ErrorKind::ConfigCreate,
        ErrorKind::AudioDeviceOpen,
        ErrorKind::DecoderCreate,
        ErrorKind::RecStart,
        ErrorKind::RecStop,
        ErrorKind::UttStart,
        ErrorKind::UttRestart,
        ErrorKind::AudioRead,
    ];

    /// Which stage of the lifecycle produced this error.
    pub fn category(self) -> ErrorCategory {
        use ErrorKind::*;
        match self {
            UndefinedFiles | UndefinedConfig | UndefinedQueue => ErrorCategory::Configuration,
            UserDirMake | UserDirCopy | MultibyteStr | MemAlloc | ConfigCreate
            | AudioDeviceOpen | DecoderCreate => ErrorCategory::Acquisition,
            RecStart | RecStop | UttStart | UttRestart | AudioRead => ErrorCategory::Runtime,
        }
    }

    /// Stable numeric code.  `0` is reserved for "no error".
    ///
    /// ```
    /// use kws_runner::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::UndefinedFiles.code(), 1);
    /// assert_eq!(ErrorKind::AudioRead.code(), 15);
    /// ```
    pub fn code(self) -> i32 {
        // ALL is in declaration order, so the index is the discriminant.
        self as i32 + 1
    }

    /// Inverse of [`code`](Self::code).  Returns `None` for `0` and for
    /// unknown values.
    pub fn from_code(code: i32) -> Option<Self> {
        if code < 1 {
            return None;
        }
        Self::ALL.get((code - 1) as usize).copied()
    }
}

/// Code of an optional error, `0` meaning success.
pub fn code_of(error: Option<ErrorKind>) -> i32 {
    error.map_or(0, ErrorKind::code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
