//! Test orchestration for GStreamer Editing Services: discover projects,
//! expand them into playback and render tests, run each under supervision
//! and report the outcomes.
pub mod cli;
pub mod encoding;
pub mod family;
pub mod interrupt;
pub mod launcher;
pub mod media;
pub mod options;
pub mod outcome;
pub mod reporter;
pub mod runner;
pub mod scenario;
pub mod supervise;
pub mod test_case;
pub mod util;
