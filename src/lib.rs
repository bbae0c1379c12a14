//! Converts 3D model files (glTF, GLB and PMD) into a render-ready JSON
//! description: one interleaved vertex buffer, per-material triangle lists,
//! an optional skeleton and second-based animation tracks.

pub mod convert;
pub mod error;
pub mod model;
pub mod scene;
pub mod settings;

pub use convert::{ConversionReport, ConvertOptions, TransformMode, convert_file, convert_files};
pub use error::{ConvertError, SourceError};
pub use model::CanonicalModel;
