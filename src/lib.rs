//! Background keyword spotting over a live audio device.
//!
//! A [`session::Session`] stages the recognition assets and opens an audio
//! device plus a speech engine.  A [`pipeline::Runner`] drives both from one
//! background thread and pushes every detected keyword into a bounded
//! [`pipeline::KeywordQueue`] that any thread may drain.

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod stt;

pub use error::{code_of, ErrorCategory, ErrorKind};
