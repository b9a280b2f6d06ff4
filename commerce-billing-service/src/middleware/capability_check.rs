//! Capability checks for the billing routes.
//!
//! With an access-token secret configured, every request must carry an HS256
//! bearer token whose `companies` claim grants the route's capability for the
//! company named in the request. Without one, the gateway in front of the
//! service is trusted to have authorised the caller already.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::observability::extract_request_id;
use std::sync::Arc;

/// Billing service capabilities.
pub mod capabilities {
    pub const PARTY_READ: &str = "billing.party:read";
    pub const PARTY_WRITE: &str = "billing.party:write";

    pub const PURCHASE_READ: &str = "billing.purchase:read";
    pub const PURCHASE_WRITE: &str = "billing.purchase:write";

    pub const SALE_READ: &str = "billing.sale:read";
    pub const SALE_WRITE: &str = "billing.sale:write";

    pub const QUOTATION_READ: &str = "billing.quotation:read";
    pub const QUOTATION_WRITE: &str = "billing.quotation:write";

    /// Cash-flow summary.
    pub const CASHFLOW_SUMMARY_READ: &str = "billing.summary.cashflow:read";

    /// Top sellers of the current month.
    pub const TOP_SELLERS_READ: &str = "billing.summary.top_sellers:read";

    pub const SALE_RETURN_READ: &str = "billing.sale_return:read";
    pub const SALE_RETURN_WRITE: &str = "billing.sale_return:write";

    pub const PURCHASE_RETURN_READ: &str = "billing.purchase_return:read";
    pub const PURCHASE_RETURN_WRITE: &str = "billing.purchase_return:write";
}

/// Capabilities granted for one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyGrant {
    pub company_id: i64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(default)]
    pub companies: Vec<CompanyGrant>,
}

impl AccessClaims {
    pub fn grants(&self, company_id: i64, capability: &str) -> bool {
        self.companies
            .iter()
            .any(|c| c.company_id == company_id && c.capabilities.iter().any(|cap| cap == capability))
    }
}

/// Who is calling, once a capability check has passed.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub company_id: i64,
    /// Correlation id to forward on outbound calls.
    pub request_id: Option<String>,
}

#[derive(Clone)]
pub struct CapabilityChecker {
    decoding_key: Option<Arc<DecodingKey>>,
}

impl CapabilityChecker {
    /// Token checks are enabled when a non-empty secret is given.
    pub fn new(secret: Option<&Secret<String>>) -> Self {
        match secret.map(|s| s.expose_secret().as_bytes()) {
            Some(bytes) if !bytes.is_empty() => {
                tracing::info!("Capability enforcement enabled (access tokens)");
                Self {
                    decoding_key: Some(Arc::new(DecodingKey::from_secret(bytes))),
                }
            }
            _ => {
                tracing::info!("Capability enforcement disabled (gateway trust model)");
                Self::disabled()
            }
        }
    }

    /// Create a disabled checker (gateway trust model).
    pub fn disabled() -> Self {
        Self { decoding_key: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.decoding_key.is_some()
    }

    /// Require `capability` for `company_id`.
    ///
    /// Disabled checkers take the user from `x-user-id` (default `system`).
    /// Otherwise a missing or invalid bearer token is a 401 and a token that
    /// does not grant the capability for the company a 403.
    pub fn require(
        &self,
        headers: &HeaderMap,
        company_id: i64,
        capability: &str,
    ) -> Result<AuthContext, AppError> {
        let request_id = extract_request_id(headers);

        let Some(key) = &self.decoding_key else {
            let user_id = headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .unwrap_or("system")
                .to_string();
            return Ok(AuthContext {
                user_id,
                company_id,
                request_id,
            });
        };

        let token = extract_bearer_token(headers)?;
        let claims = decode::<AccessClaims>(token, key, &Validation::new(Algorithm::HS256))?.claims;

        if !claims.grants(company_id, capability) {
            tracing::warn!(
                user_id = %claims.sub,
                company_id,
                capability,
                "Permission denied: missing capability"
            );
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Missing capability: {}",
                capability
            )));
        }

        Ok(AuthContext {
            user_id: claims.sub,
            company_id,
            request_id,
        })
    }
}

/// Extract the bearer token from the `authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("authorization")
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing authorization header")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid authorization header encoding")))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid Bearer token format")))
}
