pub mod cd;
pub mod convert;
pub mod error;
pub mod formats;
pub mod image;
pub mod verify;

pub use convert::{ConversionEngine, ConversionReport, ConversionState, ConvertOptions};
pub use error::{DiscConvertoError, DiscConvertoResult};
pub use formats::FormatRegistry;
pub use image::{ImageReader, ImageWriter, MemoryImage, TrackTable, WriterOptions};

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
