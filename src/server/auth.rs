//! Bearer-token authentication.
//!
//! Tokens are never stored: each configured principal carries the SHA-256
//! hex digest of its token, and a request authenticates when the digest of
//! its bearer token matches one.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use super::errors::ApiError;
use crate::config::{AuthConfig, PlatformConfig};
use crate::platform::{HttpPlatformClient, PlatformError, ProspectingPlatform};
use crate::retry::RetryPolicy;

/// Authenticated caller: one user in one workspace.
#[derive(Clone)]
pub struct Principal {
    pub workspace_id: String,
    pub user_id: String,
    pub workspace_name: Option<String>,
    pub company_pitch: Option<String>,
    /// Connected prospecting platform, if the workspace has a key.
    pub platform: Option<Arc<dyn ProspectingPlatform>>,
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("workspace_id", &self.workspace_id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform.is_some())
            .finish()
    }
}

/// Lowercase hex SHA-256 of a token.
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Principals keyed by token digest.
#[derive(Debug, Default)]
pub struct Principals {
    by_digest: HashMap<String, Principal>,
}

impl Principals {
    pub fn new(entries: impl IntoIterator<Item = (String, Principal)>) -> Self {
        Self {
            by_digest: entries
                .into_iter()
                .map(|(digest, principal)| (digest.trim().to_ascii_lowercase(), principal))
                .collect(),
        }
    }

    /// Build from config, connecting one platform client per workspace key.
    pub fn from_config(
        auth: &AuthConfig,
        platform: &PlatformConfig,
        retry: RetryPolicy,
    ) -> Result<Self, PlatformError> {
        let mut entries = Vec::with_capacity(auth.principals.len());
        for entry in &auth.principals {
            let client = match entry.platform_api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => {
                    let client = HttpPlatformClient::new(&platform.base_url, key, retry)?;
                    Some(Arc::new(client) as Arc<dyn ProspectingPlatform>)
                }
                _ => None,
            };
            entries.push((
                entry.token_sha256.clone(),
                Principal {
                    workspace_id: entry.workspace_id.clone(),
                    user_id: entry.user_id.clone(),
                    workspace_name: entry.workspace_name.clone(),
                    company_pitch: entry.company_pitch.clone(),
                    platform: client,
                },
            ));
        }
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    /// Resolve the `Authorization: Bearer` header to a principal.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<&Principal, ApiError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        self.by_digest
            .get(&token_digest(token))
            .ok_or(ApiError::Unauthorized)
    }
}
