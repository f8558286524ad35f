//! Domain types shared by every slidecast crate.
//!
//! Nothing in here performs network I/O. The only side effects live in
//! [`ffmpeg`] (subprocess helpers) and [`subtitles`] (file output).

pub mod error;
pub mod event;
pub mod ffmpeg;
pub mod job_events;
pub mod request;
pub mod status;
pub mod subtitles;
pub mod types;
