use thiserror::Error;

/// Errors raised while preparing, drawing on, or encoding an annotation surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotateError {
    #[error("Reference image {source_path} could not be loaded: {reason}")]
    ReferenceImageLoad { source_path: String, reason: String },

    #[error("Annotation could not be decoded: {0}")]
    Decode(String),

    #[error("Annotation could not be encoded: {0}")]
    Encode(String),

    #[error("Surface is not ready")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
