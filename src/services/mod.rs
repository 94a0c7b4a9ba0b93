//! Service layer for encoding, decoding and packaging images
//!
//! These services keep I/O and format concerns out of the processing
//! pipeline.

pub mod archive;
pub mod format;
pub mod io;

pub use archive::ArchiveBuilder;
pub use format::{OutputFormatHandler, PREVIEW_MAX_SIDE, PREVIEW_QUALITY};
pub use io::ImageIOService;
