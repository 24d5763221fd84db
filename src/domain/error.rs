use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("lookup miss: {0}")]
    LookupMiss(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}
