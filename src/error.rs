pub type WraplabResult<T> = Result<T, WraplabError>;

#[derive(thiserror::Error, Debug)]
pub enum WraplabError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("pixel access error: {0}")]
    PixelAccess(String),

    #[error("segmentation error: {0}")]
    Segmentation(String),

    #[error("compositing error: {0}")]
    Compositing(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WraplabError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn pixel_access(msg: impl Into<String>) -> Self {
        Self::PixelAccess(msg.into())
    }

    pub fn segmentation(msg: impl Into<String>) -> Self {
        Self::Segmentation(msg.into())
    }

    pub fn compositing(msg: impl Into<String>) -> Self {
        Self::Compositing(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}
