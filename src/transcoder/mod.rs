//! Audio conversion
//!
//! The [`Transcoder`] trait turns a raw fetched file into the final MP3. Conversion
//! runs once per item and is awaited as a single call; the staging input is removed
//! afterwards whether or not conversion succeeded.
//!
//! - [`FfmpegTranscoder`]: runs the external `ffmpeg` binary with the LAME encoder

mod ffmpeg;
mod traits;

pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
