use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

/// Claims for an organization-scoped API token. Every request is pinned to
/// one organization; repositories never see data across tenants.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrgClaims {
    pub sub: String,
    pub email: String,
    pub organization_id: Uuid,
    pub role: String,
    pub exp: usize,
}

impl OrgClaims {
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN" || self.role == "OWNER"
    }
}

pub async fn org_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate JWT
    let token_data = decode::<OrgClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Inject claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn test_claims_roundtrip() {
        let claims = OrgClaims {
            sub: "user-1".to_string(),
            email: "ops@seller.example".to_string(),
            organization_id: Uuid::new_v4(),
            role: "ADMIN".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let decoded = decode::<OrgClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(decoded.claims.organization_id, claims.organization_id);
        assert!(decoded.claims.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = OrgClaims {
            sub: "user-1".to_string(),
            email: "ops@seller.example".to_string(),
            organization_id: Uuid::new_v4(),
            role: "MEMBER".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(decode::<OrgClaims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        )
        .is_err());
    }
}
