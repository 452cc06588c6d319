use std::path::PathBuf;

/// Fatal export conditions that callers may want to tell apart. I/O and GDAL/PROJ failures are
/// reported as plain `anyhow` errors with context.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export cancelled")]
    Cancelled,
    #[error("Photo field \"{field}\" not found in layer '{layer}'")]
    MissingPhotoField { field: String, layer: String },
    #[error("No input layers given")]
    NoLayers,
    #[error("Output path {0:?} must end in .kmz")]
    InvalidOutputPath(PathBuf),
}
