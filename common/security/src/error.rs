use eduhub_http_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("no acting tenant could be established")]
    MissingTenant,
    #[error("path tenant {path} does not match identity tenant {identity}")]
    TenantMismatch { path: uuid::Uuid, identity: uuid::Uuid },
    #[error("X-Acting-Tenant was presented by a non-platform-admin identity")]
    ActingTenantNotPermitted,
    #[error("permission denied for action '{action}' on '{resource}'")]
    Forbidden { action: String, resource: String },
    #[error("policy store is unreachable: {0}")]
    PolicyStoreUnavailable(String),
}

impl From<SecurityError> for ApiError {
    fn from(value: SecurityError) -> Self {
        match value {
            SecurityError::MissingTenant => ApiError::Validation { fields: Default::default() },
            SecurityError::TenantMismatch { .. } | SecurityError::ActingTenantNotPermitted => {
                ApiError::Forbidden
            }
            SecurityError::Forbidden { .. } => ApiError::Forbidden,
            SecurityError::PolicyStoreUnavailable(_) => {
                ApiError::DependencyUnavailable { dependency: "policy_store" }
            }
        }
    }
}
