use jsonwebtoken::Algorithm;

/// Runtime configuration for JWT verification. `algorithm` is the single
/// algorithm this deployment accepts; a token signed with any other
/// algorithm is rejected before its signature is even checked, closing the
/// classic "alg: none" / HMAC-as-RSA-key confusion family of attacks.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    pub leeway_seconds: u32,
}

impl JwtConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm,
            leeway_seconds: 30,
        }
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}
