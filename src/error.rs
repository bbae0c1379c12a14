use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a scene producer while turning raw bytes into a
/// [`SourceScene`](crate::scene::SourceScene).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The import library rejected the content; carries its diagnostic string.
    #[error("import failed: {0}")]
    Import(String),

    /// The buffer ended before a fixed-layout section was fully read.
    #[error("unexpected end of data while reading {section}")]
    Truncated { section: &'static str },

    #[error("bad file signature, expected {expected:?}")]
    BadMagic { expected: &'static str },

    /// The producer read the file but it references data that does not exist.
    #[error("malformed scene: {0}")]
    Malformed(String),
}

/// Failures that abort the conversion of one input file.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("input file is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("unsupported model format: {0:?}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}
