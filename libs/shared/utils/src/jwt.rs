use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use tracing::debug;
use shared_models::auth::{JwtClaims, User};

/// Validate a Supabase-issued HS256 access token and turn its claims into a `User`.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    // Supabase stamps `aud: authenticated`; the subject is what scopes requests.
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["sub", "exp"]);

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => "Token expired".to_string(),
            ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
            ErrorKind::MissingRequiredClaim(claim) => format!("Token is missing the {} claim", claim),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                "Invalid token format".to_string()
            }
            _ => "Invalid token".to_string(),
        }
    })?;

    let claims = data.claims;
    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
