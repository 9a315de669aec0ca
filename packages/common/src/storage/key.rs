use std::fmt;

use super::error::StorageError;

/// A validated blob key.
///
/// Keys are flat file names of the form `{id}.{extension}` — no directory
/// components, no traversal, no control characters. Validation happens at
/// construction so every store operation can trust the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Validate and wrap a blob key string.
    pub fn new(key: impl Into<String>) -> Result<Self, StorageError> {
        let key = key.into();

        if key.is_empty() {
            return Err(StorageError::InvalidKey("key cannot be empty".into()));
        }

        if key.len() > 255 {
            return Err(StorageError::InvalidKey(format!(
                "key exceeds 255 bytes ({})",
                key.len()
            )));
        }

        if key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "key must not contain path separators".into(),
            ));
        }

        if key == "." || key == ".." || key.starts_with('.') {
            return Err(StorageError::InvalidKey(
                "key must not start with '.'".into(),
            ));
        }

        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(StorageError::InvalidKey(
                "key contains invalid characters (allowed: a-zA-Z0-9, -, _, .)".into(),
            ));
        }

        Ok(Self(key))
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
