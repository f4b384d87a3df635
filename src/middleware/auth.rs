use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::AppState;
use crate::auth::verify_jwt;
use crate::error::ApiError;
use crate::tenant::Principal;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticates the request and injects a `Principal` into its extensions.
///
/// Accepts the service API key (`X-API-Key`, or as a bearer token) or a JWT.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(&state, &headers)?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let service_key = state.config.security.service_api_key.as_deref();

    if let Some(value) = headers.get(API_KEY_HEADER) {
        let presented = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid X-API-Key header"))?;
        return match service_key {
            Some(key) if key == presented => Ok(Principal::service()),
            _ => {
                warn!(target: "security", "Rejected request with invalid API key");
                Err(ApiError::unauthorized("Invalid API key"))
            }
        };
    }

    let token = extract_bearer(headers).map_err(ApiError::unauthorized)?;
    if service_key == Some(token) {
        return Ok(Principal::service());
    }

    let claims = verify_jwt(token, &state.config.security).map_err(|e| {
        warn!(target: "security", error = %e, "Rejected bearer token");
        ApiError::unauthorized(e.to_string())
    })?;
    Ok(claims.into())
}

/// Extract the bearer token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_str = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Token abc"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Ok("abc.def"));
    }
}
