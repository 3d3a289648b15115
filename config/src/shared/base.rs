use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// Two caches were declared with the same name.
    #[error("Cache `{0}` is declared more than once")]
    DuplicateCacheName(String),
    /// A binding or alias references a cache that is not declared.
    #[error("`{referenced_by}` references unknown cache `{cache}`")]
    UnknownCache { referenced_by: String, cache: String },
    /// A cache declares neither or both of `source` and `share_with`.
    #[error("Cache `{0}` must declare exactly one of `source` or `share_with`")]
    AmbiguousCacheSource(String),
}
