//! Media inspection and preview generation.
//!
//! Wraps an external ffprobe/ffmpeg toolchain. Every invocation is timeboxed
//! and failures are advisory - the pipeline logs them and moves on.

mod ffmpeg;
mod types;

pub use ffmpeg::FfmpegProbe;
pub use types::*;
