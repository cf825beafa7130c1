use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("no valid pixels found in log")]
    Empty,
    #[error("raster of {width}x{height} cells exceeds the limit of {limit} cells")]
    TooLarge {
        width: usize,
        height: usize,
        limit: usize,
    },
    #[error("failed to read log: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    pub fn is_empty(&self) -> bool {
        matches!(self, RasterError::Empty)
    }
}
