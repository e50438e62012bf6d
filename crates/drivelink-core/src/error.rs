//! Errors raised by resource field lookups.

use thiserror::Error;

/// Lookup failure on an [`ApiResource`](crate::resource::ApiResource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The field is unknown locally and there is no identifier to fetch it by.
    #[error("resource is not persisted and has no id to fetch metadata with")]
    ResourceNotPersisted,
    /// The field is still missing after fetching the remote metadata.
    #[error("field '{0}' is not available on the resource")]
    FieldNotAvailable(String),
    /// The resource is fully loaded and the field does not exist.
    #[error("key '{0}' not found")]
    KeyNotFound(String),
}

pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_key() {
        let e = ResourceError::KeyNotFound("title".into());
        assert_eq!(e.to_string(), "key 'title' not found");

        let e = ResourceError::FieldNotAvailable("mimeType".into());
        assert!(e.to_string().contains("mimeType"));
    }

    #[test]
    fn std_error_trait() {
        let e = ResourceError::ResourceNotPersisted;
        let _: &dyn std::error::Error = &e;
    }
}
