use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
    Json,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};

use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Resolves the bearer token into a `User` and stores it in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Missing or malformed authorization header".to_string()))?;

    let user = validate_token(bearer.token(), &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Unwraps a JSON body, reporting malformed or mistyped input as a validation error.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}
