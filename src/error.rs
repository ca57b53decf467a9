use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    /// A configured bound is out of range or inconsistent. Raised before any
    /// page of a batch is generated.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("font error: {0}")]
    Font(String),

    /// The text backend could not produce a bitmap for a region.
    #[error("rasterization failed: {0}")]
    Rasterization(String),

    #[error("failed to write page {index}: {source}")]
    PageWrite {
        index: usize,
        #[source]
        source: Box<SynthError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthError {
    pub(crate) fn page_write(index: usize, source: SynthError) -> Self {
        SynthError::PageWrite {
            index,
            source: Box::new(source),
        }
    }
}
