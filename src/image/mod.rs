pub mod error;
pub mod memory;
pub mod models;
pub mod reader;
pub mod resolver;
pub mod table;
pub mod writer;

pub use memory::MemoryImage;
pub use reader::ImageReader;
pub use table::TrackTable;
pub use writer::{ImageWriter, WriterOptions};
