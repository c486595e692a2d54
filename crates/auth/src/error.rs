#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token missing")]
    TokenMissing,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid: {0}")]
    TokenInvalid(String),
    #[error("api key not found")]
    ApiKeyNotFound,
    #[error("api key expired")]
    ApiKeyExpired,
    #[error("api key disabled")]
    ApiKeyDisabled,
}

impl From<AuthError> for konsul_domain::Error {
    fn from(e: AuthError) -> Self {
        konsul_domain::Error::Auth(e.to_string())
    }
}
