use eduhub_http_errors::ApiError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token missing kid header")]
    MissingKeyId,
    #[error("no decoding key registered for kid '{0}'")]
    UnknownKeyId(String),
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token uses algorithm '{found:?}' but this deployment only accepts '{expected:?}'")]
    AlgorithmMismatch {
        expected: jsonwebtoken::Algorithm,
        found: jsonwebtoken::Algorithm,
    },
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("no credential presented")]
    NoCredential,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("session not found or expired")]
    SessionExpired,
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS entry missing key id (kid)")]
    JwksMissingKid,
    #[error("JWKS key '{0}' missing required RSA components")]
    JwksMissingComponents(String),
    #[error("JWKS key '{kid}' uses unsupported key type '{kty}'")]
    JwksUnsupportedKey { kid: String, kty: String },
    #[error("JWKS key '{kid}' uses unsupported alg '{alg}'")]
    JwksUnsupportedAlg { kid: String, alg: String },
    #[error("session store error: {0}")]
    Store(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

/// Most identity-resolution failures are the caller's fault and map to
/// `401 unauthenticated`. JWKS fetch/parse failures are ours (the identity
/// provider is unreachable or misbehaving) and map to
/// `503 dependency_unavailable` instead. None of the variant-specific
/// detail in `AuthError` is leaked in the response body; it is only for
/// server-side logs.
impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        tracing::debug!(error = %value, "authentication failed");
        match value {
            AuthError::JwksFetch(_) | AuthError::JwksDecode(_) => {
                ApiError::DependencyUnavailable { dependency: "identity_provider" }
            }
            _ => ApiError::Unauthenticated,
        }
    }
}
