use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Tenant used when a token carries no tenant_id
pub const DEFAULT_TENANT_ID: &str = "default";

/// Token claims read by the push endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    /// Tenant (gym/organisation) the user belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Who a durable push stream belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentity {
    pub tenant_id: String,
    pub user_id: String,
}

impl Claims {
    /// Resolve the registry key for these claims.
    ///
    /// A blank subject is rejected; a missing or blank tenant maps to
    /// [`DEFAULT_TENANT_ID`].
    pub fn into_identity(self) -> Result<StreamIdentity, AppError> {
        let user_id = self.sub.trim();
        if user_id.is_empty() {
            return Err(AppError::Auth("Token has no subject".to_string()));
        }

        let tenant_id = self
            .tenant_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TENANT_ID);

        Ok(StreamIdentity {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, tenant_id: Option<&str>) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: 0,
            iat: 0,
            tenant_id: tenant_id.map(str::to_string),
        }
    }

    #[test]
    fn test_identity_from_claims() {
        let identity = claims("user-1", Some("gym-7")).into_identity().unwrap();
        assert_eq!(
            identity,
            StreamIdentity {
                tenant_id: "gym-7".to_string(),
                user_id: "user-1".to_string(),
            }
        );
    }

    #[test]
    fn test_blank_tenant_uses_default() {
        let identity = claims("user-1", Some("  ")).into_identity().unwrap();
        assert_eq!(identity.tenant_id, DEFAULT_TENANT_ID);

        let identity = claims("user-1", None).into_identity().unwrap();
        assert_eq!(identity.tenant_id, DEFAULT_TENANT_ID);
    }

    #[test]
    fn test_blank_subject_rejected() {
        assert!(matches!(claims("", Some("gym-7")).into_identity(), Err(AppError::Auth(_))));
        assert!(matches!(claims("   ", None).into_identity(), Err(AppError::Auth(_))));
    }
}
