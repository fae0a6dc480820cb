use crate::{Did, DidError};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const DEFAULT_CREDENTIAL_TYPE: &str = "AchievementCredential";

/// Longest lifetime accepted by [`CredentialBuilder::expires_in`] (100 years).
pub const MAX_LIFETIME_SECS: i64 = 100 * 365 * 86_400;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid {role} identifier '{identifier}': {source}")]
    InvalidIdentifier {
        role: &'static str,
        identifier: String,
        #[source]
        source: DidError,
    },
    #[error("claim type must not be empty")]
    EmptyClaimType,
    #[error("claim body must not redefine the reserved field '{0}'")]
    ReservedClaimField(&'static str),
    #[error("credential type must not be empty")]
    EmptyCredentialType,
    #[error("{field} {value} is not a valid NumericDate")]
    InvalidTimestamp { field: &'static str, value: i64 },
    #[error("expiration date must be after the issuance date")]
    ExpiresBeforeIssued,
    #[error("lifetime must be between 1 and 3153600000 seconds, got {0}")]
    InvalidLifetime(i64),
}

/// The typed fact a credential attests to.
///
/// Serialized as `{"type": <claim_type>, ...body}`; body fields keep their
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(rename = "type")]
    pub claim_type: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Achievement {
    pub(crate) fn validate(&self) -> Result<(), CredentialError> {
        if self.claim_type.trim().is_empty() {
            return Err(CredentialError::EmptyClaimType);
        }
        if self.body.contains_key("type") {
            return Err(CredentialError::ReservedClaimField("type"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSubject {
    pub id: Did,
    pub achievement: Achievement,
}

/// W3C-style Verifiable Credential binding an achievement to a subject DID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    #[serde(rename = "type")]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub issuer: Did,

    #[serde(rename = "issuanceDate")]
    pub issuance_date: DateTime<Utc>,

    #[serde(
        rename = "expirationDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_date: Option<DateTime<Utc>>,

    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubject,
}

impl Credential {
    /// The specific (non-generic) credential type, if any.
    pub fn credential_type(&self) -> Option<&str> {
        self.types
            .iter()
            .map(String::as_str)
            .find(|t| *t != VERIFIABLE_CREDENTIAL_TYPE)
    }
}

/// Assembles a [`Credential`] from caller-supplied fields.
///
/// Validation is structural only: identifiers must decode, the claim type must
/// be present and timestamps must be representable as JWT NumericDates. The
/// builder never resolves anything.
#[derive(Debug, Clone)]
pub struct CredentialBuilder {
    issuer: String,
    subject: String,
    claim_type: String,
    claim_body: Map<String, Value>,
    issued_at: DateTime<Utc>,
    credential_type: String,
    extra_context: Vec<String>,
    id: Option<String>,
    expiry: Option<Expiry>,
}

#[derive(Debug, Clone, Copy)]
enum Expiry {
    At(DateTime<Utc>),
    After(i64),
}

impl CredentialBuilder {
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        claim_type: impl Into<String>,
        claim_body: Map<String, Value>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            claim_type: claim_type.into(),
            claim_body,
            issued_at,
            credential_type: DEFAULT_CREDENTIAL_TYPE.to_string(),
            extra_context: Vec::new(),
            id: None,
            expiry: None,
        }
    }

    /// Set the specific type listed after `VerifiableCredential`.
    pub fn credential_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = credential_type.into();
        self
    }

    /// Add a schema URI after the base credentials context.
    pub fn context(mut self, uri: impl Into<String>) -> Self {
        self.extra_context.push(uri.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expiry = Some(Expiry::At(expires_at));
        self
    }

    /// Expire `secs` seconds after issuance. Replaces any earlier expiry.
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expiry = Some(Expiry::After(secs));
        self
    }

    pub fn build(self) -> Result<Credential, CredentialError> {
        let issuer = parse_identifier("issuer", self.issuer)?;
        let subject = parse_identifier("subject", self.subject)?;

        let achievement = Achievement {
            claim_type: self.claim_type,
            body: self.claim_body,
        };
        achievement.validate()?;

        if self.credential_type.trim().is_empty() {
            return Err(CredentialError::EmptyCredentialType);
        }

        // Tokens carry whole seconds.
        let issuance_date = numeric_date("issuanceDate", self.issued_at)?;
        let expires_at = match self.expiry {
            None => None,
            Some(Expiry::At(at)) => Some(at),
            Some(Expiry::After(secs)) => Some(lifetime_end(self.issued_at, secs)?),
        };
        let expiration_date = expires_at
            .map(|exp| numeric_date("expirationDate", exp))
            .transpose()?;
        if matches!(expiration_date, Some(exp) if exp <= issuance_date) {
            return Err(CredentialError::ExpiresBeforeIssued);
        }

        let mut context = vec![CREDENTIALS_V1_CONTEXT.to_string()];
        context.extend(
            self.extra_context
                .into_iter()
                .filter(|uri| uri != CREDENTIALS_V1_CONTEXT),
        );

        let mut types = vec![VERIFIABLE_CREDENTIAL_TYPE.to_string()];
        if self.credential_type != VERIFIABLE_CREDENTIAL_TYPE {
            types.push(self.credential_type);
        }

        Ok(Credential {
            context,
            types,
            id: self.id,
            issuer,
            issuance_date,
            expiration_date,
            credential_subject: CredentialSubject {
                id: subject,
                achievement,
            },
        })
    }
}

fn parse_identifier(role: &'static str, identifier: String) -> Result<Did, CredentialError> {
    identifier
        .parse()
        .map_err(|source| CredentialError::InvalidIdentifier {
            role,
            identifier,
            source,
        })
}

fn lifetime_end(issued_at: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, CredentialError> {
    if !(1..=MAX_LIFETIME_SECS).contains(&secs) {
        return Err(CredentialError::InvalidLifetime(secs));
    }
    issued_at
        .checked_add_signed(Duration::seconds(secs))
        .ok_or(CredentialError::InvalidLifetime(secs))
}

fn numeric_date(
    field: &'static str,
    instant: DateTime<Utc>,
) -> Result<DateTime<Utc>, CredentialError> {
    let value = instant.timestamp();
    if value < 0 {
        return Err(CredentialError::InvalidTimestamp { field, value });
    }
    Ok(instant.trunc_subsecs(0))
}

/// Convert NumericDate seconds back into an instant.
pub(crate) fn from_numeric_date(
    field: &'static str,
    value: i64,
) -> Result<DateTime<Utc>, CredentialError> {
    if value < 0 {
        return Err(CredentialError::InvalidTimestamp { field, value });
    }
    DateTime::from_timestamp(value, 0).ok_or(CredentialError::InvalidTimestamp { field, value })
}
