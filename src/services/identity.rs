use crate::api::error::AppError;
use crate::utils::auth::validate_jwt;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Authorization oracle: turns a bearer token into a caller identity
pub trait IdentityResolver: Send + Sync {
    fn resolve_identity(&self, bearer_token: &str) -> Result<Identity, AppError>;
}

/// HS256 JWT resolver; the `sub` claim is the user id
pub struct JwtIdentityResolver {
    secret: String,
}

impl JwtIdentityResolver {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve_identity(&self, bearer_token: &str) -> Result<Identity, AppError> {
        let claims = validate_jwt(bearer_token, &self.secret).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            AppError::Unauthorized("Couldn't validate JWT".to_string())
        })?;

        Ok(Identity {
            user_id: claims.sub,
        })
    }
}
