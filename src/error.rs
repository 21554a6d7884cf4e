use thiserror::Error;

/// Errors that can occur while preparing or exporting a vectorization.
///
/// The engine itself never fails on degenerate geometry; the only fatal
/// precondition is a bitmap whose declared size disagrees with its buffer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VectorizeError {
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },

    #[error("image dimensions {width}x{height} overflow the pixel index range")]
    DimensionOverflow { width: usize, height: usize },

    #[error(
        "bit-packed buffer for {width}x{height} image must be {expected} bytes, got {actual}"
    )]
    BufferLength {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("failed to render image: {0}")]
    Render(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
