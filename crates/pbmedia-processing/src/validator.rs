use std::path::Path;

/// Validation failures reported synchronously at enqueue time.
///
/// A file that fails validation never becomes a queue item.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Not an image: {content_type}")]
    NotAnImage { content_type: String },

    #[error("Content type {content_type} does not match extension '{extension}'")]
    ContentTypeMismatch {
        extension: String,
        content_type: String,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Image intake validator
///
/// Checks size, MIME prefix, extension, and extension/content-type agreement
/// before a file is admitted to the queue. Rules live here so the queue
/// manager and any embedding application validate identically.
pub struct MediaValidator {
    max_file_size: usize,
    content_type_prefix: String,
    allowed_extensions: Vec<String>,
}

impl MediaValidator {
    pub fn new(
        max_file_size: usize,
        content_type_prefix: String,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            content_type_prefix,
            allowed_extensions,
        }
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        if !content_type
            .to_lowercase()
            .starts_with(&self.content_type_prefix)
        {
            return Err(ValidationError::NotAnImage {
                content_type: content_type.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename)
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }
        Ok(())
    }

    /// Reject files whose declared Content-Type disagrees with their
    /// extension. This catches renamed files (e.g. a text file with a `.jpg`
    /// name arriving as `text/plain`) before any decode work happens.
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let extension = extension_of(filename)
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;
        let normalized = content_type.to_lowercase();

        let expected: &[&str] = match extension.as_str() {
            "jpg" | "jpeg" => &["image/jpeg"],
            "png" => &["image/png"],
            "gif" => &["image/gif"],
            "webp" => &["image/webp"],
            "avif" => &["image/avif"],
            "bmp" => &["image/bmp"],
            _ => {
                tracing::debug!(
                    extension = %extension,
                    content_type = %content_type,
                    "Unknown extension, skipping Content-Type/extension cross-validation"
                );
                return Ok(());
            }
        };

        if !expected.iter().any(|ct| *ct == normalized) {
            return Err(ValidationError::ContentTypeMismatch {
                extension,
                content_type: content_type.to_string(),
            });
        }
        Ok(())
    }

    /// Validate every aspect of a file in intake order.
    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        file_size: usize,
    ) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_content_type(content_type)?;
        self.validate_extension(filename)?;
        self.validate_extension_content_type_match(filename, content_type)?;
        Ok(())
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
