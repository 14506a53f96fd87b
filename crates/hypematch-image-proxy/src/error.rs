//! Error types for the HypeMatch image proxy

use std::fmt;

#[derive(Debug)]
pub enum ImageProxyError {
    Cache(image_file_cache::ImageCacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ImageProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageProxyError::Cache(err) => write!(f, "Cache error: {}", err),
            ImageProxyError::Io(err) => write!(f, "IO error: {}", err),
            ImageProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ImageProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageProxyError::Cache(err) => Some(err),
            ImageProxyError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<image_file_cache::ImageCacheError> for ImageProxyError {
    fn from(err: image_file_cache::ImageCacheError) -> Self {
        ImageProxyError::Cache(err)
    }
}

impl From<std::io::Error> for ImageProxyError {
    fn from(err: std::io::Error) -> Self {
        ImageProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ImageProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ImageProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = ImageProxyError::Cache(image_file_cache::ImageCacheError::InvalidUrl(
            "empty url".to_string(),
        ));
        assert_eq!(format!("{}", err), "Cache error: Invalid image URL: empty url");
    }

    #[test]
    fn test_config_error_display() {
        let err = ImageProxyError::Config("bad RETENTION_DAYS".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad RETENTION_DAYS");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ImageProxyError =
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(format!("{}", err).contains("port taken"));
    }
}
