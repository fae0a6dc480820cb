use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use vouch_identity::{
    InvalidClockSkew, KeyError, VerifierOptions, DEFAULT_CLOCK_SKEW_SECS, MAX_LIFETIME_SECS,
};

/// Environment variable that overrides `secret` from the file.
pub const SECRET_ENV_VAR: &str = "VOUCH_ISSUER_SECRET";

/// Paths served by the service itself; offerings may not claim them.
const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/verify"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid offering '{path}': {reason}")]
    InvalidOffering { path: String, reason: &'static str },

    #[error("invalid clock_skew_secs: {0}")]
    ClockSkew(#[from] InvalidClockSkew),

    #[error("invalid issuer secret: {0}")]
    Secret(#[from] KeyError),
}

/// Configuration for the issuer service.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct IssuerConfig {
    /// Human-readable issuer name, shown on `GET /`.
    pub name: String,

    pub listen_addr: SocketAddr,

    /// Hex-encoded secp256k1 private key. A random key is generated when
    /// neither this nor `VOUCH_ISSUER_SECRET` is set.
    pub secret: Option<String>,

    /// Optional log level string (e.g., "info", "vouch_issuer=debug").
    pub log_level: Option<String>,

    /// Clock skew tolerated by `POST /verify`.
    pub clock_skew_secs: i64,

    #[serde(rename = "offering")]
    pub offerings: Vec<Offering>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            name: "Vouch Mock Issuer".to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            secret: None,
            log_level: None,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            offerings: Offering::defaults(),
        }
    }
}

impl IssuerConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.trim().is_empty() {
                config.secret = Some(secret);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Verifier options for `POST /verify`.
    pub fn verifier_options(&self) -> Result<VerifierOptions, ConfigError> {
        Ok(VerifierOptions::with_clock_skew(self.clock_skew_secs)?)
    }

    /// Offering paths must be absolute, unique, and not shadow built-in routes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.verifier_options()?;

        let mut seen = HashSet::new();
        for offering in &self.offerings {
            let invalid = |reason: &'static str| ConfigError::InvalidOffering {
                path: offering.path.clone(),
                reason,
            };
            if !offering.path.starts_with('/') {
                return Err(invalid("path must start with '/'"));
            }
            if RESERVED_PATHS.contains(&offering.path.as_str()) {
                return Err(invalid("path is reserved"));
            }
            if !seen.insert(offering.path.as_str()) {
                return Err(invalid("path is declared more than once"));
            }
            if offering.claim_type.trim().is_empty() || offering.credential_type.trim().is_empty() {
                return Err(invalid("claim_type and credential_type must not be empty"));
            }
            if matches!(offering.expires_in_secs, Some(secs) if !(1..=MAX_LIFETIME_SECS).contains(&secs))
            {
                return Err(invalid("expires_in_secs must be between 1 second and 100 years"));
            }
        }
        Ok(())
    }
}

/// One credential the service hands out, mounted at `path`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Offering {
    pub path: String,
    pub credential_type: String,
    pub claim_type: String,
    pub metric: String,
    pub period: String,
    pub value: Value,
    #[serde(default)]
    pub expires_in_secs: Option<i64>,
}

impl Offering {
    fn new(
        path: &str,
        credential_type: &str,
        claim_type: &str,
        metric: &str,
        value: u64,
    ) -> Self {
        Self {
            path: path.to_string(),
            credential_type: credential_type.to_string(),
            claim_type: claim_type.to_string(),
            metric: metric.to_string(),
            period: "2025-10".to_string(),
            value: value.into(),
            expires_in_secs: None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "/issue-vc",
                "RndPerformanceCredential",
                "GithubActivity",
                "Commit Count",
                142,
            ),
            Self::new(
                "/issue-vc-growth",
                "PlatformGrowthCredential",
                "SaaSActivity",
                "API Calls",
                11500,
            ),
            Self::new(
                "/issue-vc-contract",
                "ContractFulfillmentCredential",
                "B2BContract",
                "Contract Fulfillment",
                4,
            ),
        ]
    }

    /// Achievement body: `{metric, period, result: {value}}`.
    pub fn claim_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("metric".into(), json!(self.metric));
        body.insert("period".into(), json!(self.period));
        body.insert("result".into(), json!({ "value": self.value }));
        body
    }
}
