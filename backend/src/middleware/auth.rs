//! Authentication middleware
//!
//! Bearer tokens are issued elsewhere; this server only verifies them and
//! enforces `resource:action` permissions.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    ///
    /// `resource:*` grants every action on the resource.
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let exact = format!("{}:{}", resource, action);
        let wildcard = format!("{}:*", resource);
        self.permissions
            .iter()
            .any(|p| *p == exact || *p == wildcard)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub sub: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Validates the bearer token and stores the [`AuthUser`] in request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    match authenticate(token, &state.config.jwt.secret) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn authenticate(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        permissions: claims.permissions,
    })
}

/// Extractor for authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: &str, action: &str) -> Result<(), AppError> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions(format!(
            "{}:{}",
            resource, action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, permissions: &[&str], secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_user() {
        let id = Uuid::new_v4();
        let user = authenticate(&token(&id.to_string(), &["stock:read"], "s3cret"), "s3cret")
            .unwrap();
        assert_eq!(user.user_id, id);
        assert!(user.has_permission("stock", "read"));
        assert!(!user.has_permission("stock", "write"));
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let err = authenticate(&token(&Uuid::new_v4().to_string(), &[], "a"), "b").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_non_uuid_subject_is_unauthorized() {
        let err = authenticate(&token("somebody", &[], "k"), "k").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_wildcard_permission() {
        let user = AuthUser {
            user_id: Uuid::nil(),
            permissions: vec!["kitchen_orders:*".to_string()],
        };
        assert!(check_permission(&user, "kitchen_orders", "process").is_ok());
        assert!(matches!(
            check_permission(&user, "finance", "read"),
            Err(AppError::InsufficientPermissions(_))
        ));
    }
}
