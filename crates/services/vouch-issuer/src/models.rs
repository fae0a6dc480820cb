use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vouch_identity::Credential;

/// Body of a `POST` to an offering path.
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, Default)]
pub struct IssueRequest {
    /// Subject identifier the credential is issued to.
    #[schema(example = "did:key:zQ3shT1GokQF68docxRmRpQTjnaB66odZYc2tfAv6YMNJqS7g")]
    pub did: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, Default)]
pub struct VerifyRequest {
    /// Compact VC-JWT.
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct VerifyResponse {
    #[schema(example = "did:key:zQ3shScWratmosu8R95gHDdPPypPdxht5hkJ16K2Pv7NWWW4m")]
    pub issuer: String,
    #[schema(example = "did:key:zQ3shT1GokQF68docxRmRpQTjnaB66odZYc2tfAv6YMNJqS7g")]
    pub subject: String,
    #[schema(value_type = Object)]
    pub credential: Credential,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub issuer: String,
}

/// Error body. `reason` is present for verification failures only.
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "signature_invalid")]
    pub reason: Option<String>,
}
