//! Error types for the image cache

use crate::types::FailureKind;
use std::fmt;

#[derive(Debug)]
pub enum ImageCacheError {
    InvalidUrl(String),
    UnknownCategory(String),
    Http(Box<reqwest::Error>),
    Status(u16),
    TooLarge { limit: u64, actual: u64 },
    Decode(image::ImageError),
    Io(Box<std::io::Error>),
    /// A background download or store task did not complete
    Task(String),
}

impl ImageCacheError {
    /// Which bucket of the failure taxonomy this error belongs to
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUrl(_) | Self::UnknownCategory(_) => FailureKind::InvalidUrl,
            Self::Http(_) | Self::Status(_) | Self::TooLarge { .. } => FailureKind::Network,
            Self::Decode(_) => FailureKind::Decode,
            Self::Io(_) | Self::Task(_) => FailureKind::Filesystem,
        }
    }
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(msg) => write!(f, "Invalid image URL: {}", msg),
            Self::UnknownCategory(name) => write!(f, "Unknown image category: {}", name),
            Self::Http(err) => write!(f, "HTTP error: {}", err),
            Self::Status(code) => write!(f, "Remote returned status {}", code),
            Self::TooLarge { limit, actual } => {
                write!(f, "Image too large: {} bytes (limit {})", actual, limit)
            }
            Self::Decode(err) => write!(f, "Image decode error: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Task(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err.as_ref()),
            Self::Decode(err) => Some(err),
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ImageCacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Box::new(err))
    }
}

impl From<image::ImageError> for ImageCacheError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err)
    }
}

impl From<std::io::Error> for ImageCacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ImageCacheError::Status(404);
        assert_eq!(format!("{}", err), "Remote returned status 404");
    }

    #[test]
    fn test_too_large_display() {
        let err = ImageCacheError::TooLarge {
            limit: 10,
            actual: 42,
        };
        assert_eq!(format!("{}", err), "Image too large: 42 bytes (limit 10)");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ImageCacheError::InvalidUrl("empty".into()).kind(),
            FailureKind::InvalidUrl
        );
        assert_eq!(ImageCacheError::Status(500).kind(), FailureKind::Network);
        assert_eq!(
            ImageCacheError::Task("panicked".into()).kind(),
            FailureKind::Filesystem
        );

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ImageCacheError::from(io).kind(), FailureKind::Filesystem);
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = ImageCacheError::from(io);
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("disk full"));
    }
}
