use thiserror::Error;

use std::io::Error as IOError;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct LprError(LprErrorKind);

#[derive(Debug, Error)]
pub enum LprErrorKind {
    #[error(transparent)]
    IOError(#[from] IOError),
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("font data could not be parsed")]
    InvalidFont,
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("detector failed: {0}")]
    Detector(String),
    #[error("recognizer failed: {0}")]
    Recognizer(String),
    #[error("no model backend compiled in (enable the `{0}` feature)")]
    BackendUnavailable(&'static str),
    #[cfg(feature = "tensorflow")]
    #[error(transparent)]
    TensorflowError(#[from] tensorflow::Status),
}

impl LprError {
    pub fn kind(&self) -> &LprErrorKind {
        &self.0
    }

    pub fn detector(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::Detector(msg.into()))
    }

    pub fn recognizer(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::Recognizer(msg.into()))
    }

    pub fn model_load(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::ModelLoad(msg.into()))
    }
}

impl<T> From<T> for LprError
where T: Into<LprErrorKind>
{
    fn from(e: T) -> Self {
        Self(e.into())
    }
}
