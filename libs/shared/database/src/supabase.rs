use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Failures reported by PostgREST, kept typed inside `anyhow::Error` so callers
/// can `downcast_ref` the ones that carry domain meaning.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated ({}): {message}", .constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    /// True when `err` is a unique violation, optionally on a specific constraint.
    pub fn is_unique_violation(err: &anyhow::Error, constraint_name: Option<&str>) -> bool {
        match err.downcast_ref::<SupabaseError>() {
            Some(SupabaseError::UniqueViolation { constraint, .. }) => match constraint_name {
                Some(expected) => constraint.as_deref().map_or(true, |c| c == expected),
                None => true,
            },
            _ => false,
        }
    }

    fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<PostgrestErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|p| p.message.clone())
            .unwrap_or_else(|| body.to_string());

        let is_unique = parsed
            .as_ref()
            .and_then(|p| p.code.as_deref())
            .map_or(status == StatusCode::CONFLICT, |code| code == UNIQUE_VIOLATION);

        if is_unique {
            return SupabaseError::UniqueViolation {
                constraint: constraint_name_from(&message),
                message,
            };
        }

        match status.as_u16() {
            401 | 403 => SupabaseError::Unauthorized(message),
            404 => SupabaseError::NotFound(message),
            code => SupabaseError::Api { status: code, message },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

// `duplicate key value violates unique constraint "appointments_active_slot_key"`
fn constraint_name_from(message: &str) -> Option<String> {
    let start = message.find('"')? + 1;
    let len = message[start..].find('"')?;
    Some(message[start..start + len].to_string())
}

/// Headers asking PostgREST to echo written rows back.
pub fn prefer_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    /// Bearer token for ledger-wide reads and catalog write-backs. Falls back to
    /// anonymous access when no service role key is configured.
    pub fn service_key(&self) -> Option<&str> {
        if self.service_role_key.is_empty() {
            None
        } else {
            Some(&self.service_role_key)
        }
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            let err = SupabaseError::from_response(status, &error_text);
            match &err {
                SupabaseError::UniqueViolation { .. } => warn!("API rejected write: {}", err),
                _ => error!("API error ({}): {}", status, error_text),
            }
            return Err(anyhow!(err));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }
}
