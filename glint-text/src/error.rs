use glint_core::RenderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextError {
    #[error("Bitmap font not registered: {0}")]
    FontNotFound(String),
    #[error("Invalid {kind} value: {value:?}")]
    InvalidAlignment { kind: &'static str, value: String },
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("Bitmap font text is limited to {limit} characters (got {got})")]
    TextTooLong { limit: usize, got: usize },
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<TextError> for RenderError {
    /// Text failures surfacing through `DisplayObject::render`.
    fn from(err: TextError) -> Self {
        match err {
            TextError::Render(inner) => inner,
            other => RenderError::Content(Box::new(other)),
        }
    }
}
