use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("wildcard parameter not allowed outside a list filter: {0}")]
    WildcardNotAllowed(String),

    #[error("invalid uri {input:?}: {reason}")]
    InvalidUri { input: String, reason: String },
}
