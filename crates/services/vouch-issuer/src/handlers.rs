use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use vouch_identity::{
    token, CredentialBuilder, CredentialError, KeyPair, KeyType, Resolver, Verifier,
};

use crate::config::{ConfigError, IssuerConfig, Offering};
use crate::error::ApiError;
use crate::models::*;

/// Shared, read-only state of a running issuer.
#[derive(Clone)]
pub struct AppState {
    pub name: Arc<str>,
    pub issuer: Arc<KeyPair>,
    pub verifier: Verifier,
}

impl AppState {
    pub fn new(name: impl Into<Arc<str>>, issuer: KeyPair, verifier: Verifier) -> Self {
        Self {
            name: name.into(),
            issuer: Arc::new(issuer),
            verifier,
        }
    }

    /// Build state from configuration, generating a throwaway key if no secret is set.
    pub fn from_config(config: &IssuerConfig) -> Result<Self, ConfigError> {
        let options = config.verifier_options()?;
        let issuer = match config.secret.as_deref() {
            Some(secret) => KeyPair::from_hex(KeyType::Secp256k1, secret)?,
            None => {
                warn!("No issuer secret configured; generating an ephemeral key");
                KeyPair::generate()
            }
        };
        let verifier = Verifier::new(Arc::new(Resolver::default())).with_options(options);
        Ok(Self::new(config.name.as_str(), issuer, verifier))
    }
}

// GET /
pub async fn root_handler(State(state): State<AppState>) -> String {
    format!("{} is running. Issuer DID: {}", state.name, state.issuer.did)
}

// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        issuer: state.issuer.did.to_string(),
    })
}

// POST <offering.path>
#[utoipa::path(
    post,
    path = "/issue-vc",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Signed VC-JWT", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing or undecodable subject DID", body = ErrorBody,
            example = json!({ "error": "request body must contain \"did\"" }))
    )
)]
pub async fn issue_credential_handler(
    State(state): State<AppState>,
    Extension(offering): Extension<Arc<Offering>>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let subject = request
        .did
        .filter(|did| !did.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("request body must contain \"did\"".to_string()))?;
    info!(path = %offering.path, subject = %subject, "Credential requested");

    let issued_at = Utc::now();
    let mut builder = CredentialBuilder::new(
        state.issuer.did.as_str(),
        subject,
        &offering.claim_type,
        offering.claim_body(),
        issued_at,
    )
    .credential_type(&offering.credential_type);
    if let Some(secs) = offering.expires_in_secs {
        builder = builder.expires_in(secs);
    }

    let credential = builder.build().map_err(|e| match e {
        e @ CredentialError::InvalidIdentifier { .. } => ApiError::BadRequest(e.to_string()),
        e => ApiError::InternalServerError(e.to_string()),
    })?;
    let jwt = token::issue(&credential, state.issuer.as_ref())
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    info!(
        path = %offering.path,
        credential_type = %offering.credential_type,
        "Credential issued"
    );
    Ok(jwt)
}

// POST /verify
#[utoipa::path(
    post,
    path = "/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Token verified", body = VerifyResponse),
        (status = 400, description = "Malformed token", body = ErrorBody),
        (status = 401, description = "Bad signature or outside validity window", body = ErrorBody,
            example = json!({ "error": "signature is invalid: signature does not match", "reason": "signature_invalid" })),
        (status = 422, description = "Issuer cannot be resolved or algorithm unsupported", body = ErrorBody)
    )
)]
pub async fn verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let jwt = request
        .token
        .ok_or_else(|| ApiError::BadRequest("request body must contain \"token\"".to_string()))?;

    let verified = state.verifier.verify(&jwt).map_err(|err| {
        warn!(reason = err.reason(), "Rejected token: {}", err);
        ApiError::from(err)
    })?;

    let credential = verified.credential;
    Ok(Json(VerifyResponse {
        issuer: credential.issuer.to_string(),
        subject: credential.credential_subject.id.to_string(),
        credential,
    }))
}
