pub mod cue;
pub mod iso;

use crate::image::error::{ImageError, ImageResult};
use crate::image::reader::ImageReader;
use crate::image::writer::ImageWriter;
use log::debug;
use std::path::Path;

pub struct FormatDescriptor {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub detect: fn(&Path) -> bool,
    pub open: fn(&Path) -> ImageResult<Box<dyn ImageReader>>,
    pub create: fn() -> Box<dyn ImageWriter>,
}

/// The image formats known to the program, built once at startup and passed around.
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FormatDescriptor {
            name: "cue",
            extensions: &["cue"],
            detect: cue::detect,
            open: |path| Ok(Box::new(cue::CueImage::open(path)?)),
            create: || Box::new(cue::CueWriter::new()),
        });
        registry.register(FormatDescriptor {
            name: "iso",
            extensions: &["iso"],
            detect: iso::detect,
            open: |path| Ok(Box::new(iso::IsoImage::open(path)?)),
            create: || Box::new(iso::IsoWriter::new()),
        });
        registry
    }

    pub fn register(&mut self, format: FormatDescriptor) {
        debug!("Registering image format {}", format.name);
        self.formats.push(format);
    }

    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    pub fn find(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn detect(&self, path: &Path) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| (f.detect)(path))
    }

    pub fn open(&self, path: &Path) -> ImageResult<Box<dyn ImageReader>> {
        let format = self.detect(path).ok_or_else(|| {
            ImageError::unsupported(format!("Image {}", path.display()))
        })?;
        debug!("Opening {} as {}", path.display(), format.name);
        (format.open)(path)
    }

    /// Picks a writer by explicit name, or by the extension of `path`.
    pub fn writer_for(&self, path: &Path, name: Option<&str>) -> ImageResult<Box<dyn ImageWriter>> {
        let format = match name {
            Some(name) => self.find(name),
            None => {
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                self.formats.iter().find(|f| {
                    f.extensions
                        .iter()
                        .any(|e| e.eq_ignore_ascii_case(extension))
                })
            }
        };

        format
            .map(|f| (f.create)())
            .ok_or_else(|| ImageError::unsupported(format!("Writing {}", path.display())))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
