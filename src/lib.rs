//! yt-audio-archiver
//!
//! Batch audio archiver around an external yt-dlp engine: reads a URL list,
//! resolves each URL as a single video or a playlist, downloads best-quality
//! opus audio with embedded tags and tracks everything in a persistent JSON
//! history so repeated runs only fetch what is new.

pub mod core;
pub mod utils;
