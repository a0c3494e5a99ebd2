//! Playback verification engine
//!
//! Launches an external player against a stream, watches its diagnostic
//! output for marker lines, and reduces them to one bounded-time verdict.

pub mod classifier;
pub mod codec;
pub mod launcher;
pub mod session;

pub use classifier::{Classifier, MarkerRule, Outcome};
pub use codec::PlayerLineCodec;
pub use launcher::{
    OutputReader, OutputSource, PlayerHandle, PlayerLauncher, PlayerProcess, ProcessGuard,
    ProcessLauncher,
};
pub use session::{
    Conclusion, MarkerPrecedence, PlaybackVerifier, SessionReport, VerificationSession,
};
