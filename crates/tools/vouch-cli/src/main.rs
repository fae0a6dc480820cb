use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vouch_identity::{
    token, CredentialBuilder, DidError, KeyPair, KeyType, Resolver, VerifiedCredential, Verifier,
    VerifierOptions, DEFAULT_CLOCK_SKEW_SECS, MAX_CLOCK_SKEW_SECS, MAX_LIFETIME_SECS,
};

/// Keypair file written by `vouch keygen --output`.
#[derive(Serialize, Deserialize)]
struct KeypairFileFormat {
    did: String,
    key_type: KeyType,
    public_key: String,
    secret_key: String,
    generated_at: String,
}

/// Formats a `DidError` into a user-friendly `anyhow::Error`.
fn format_did_error(did_err: &DidError, problematic_input: &str) -> anyhow::Error {
    match did_err {
        DidError::Malformed => anyhow!(
            "Invalid DID '{}': expected 'did:<method>:<method-specific-id>'.",
            problematic_input
        ),
        DidError::UnsupportedMethod(method) => anyhow!(
            "Unsupported DID method in '{}': found '{}'. Only 'did:key' DIDs are currently supported.",
            problematic_input,
            method
        ),
        DidError::InvalidEncoding(reason) => anyhow!(
            "Invalid encoding in DID '{}': {}. The identifier must be multibase base58btc (leading 'z').",
            problematic_input,
            reason
        ),
        DidError::InvalidKey(source) => anyhow!(
            "DID '{}' does not embed a usable public key: {}",
            problematic_input,
            source
        ),
        DidError::NonCanonical => anyhow!(
            "DID '{}' is not in canonical form; re-encode it from the public key.",
            problematic_input
        ),
    }
}

/// Command-line wallet for achievement credentials
#[derive(Parser)]
#[clap(name = "vouch", author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

/// Where the signing key comes from.
#[derive(Args, Debug)]
struct SecretArgs {
    /// Hex-encoded 32-byte private key, with or without `0x`
    #[clap(long, env = "VOUCH_SECRET", hide_env_values = true, conflicts_with = "key_file")]
    secret: Option<String>,

    /// Keypair file produced by `vouch keygen --output`
    #[clap(long)]
    key_file: Option<PathBuf>,

    /// Interpret `--secret` as an Ed25519 seed instead of a secp256k1 scalar
    #[clap(long)]
    ed25519: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new random keypair
    Keygen {
        /// Generate an Ed25519 key instead of secp256k1
        #[clap(long)]
        ed25519: bool,

        /// Write the keypair to this JSON file instead of printing the secret
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the DID for a private key
    Did {
        #[clap(flatten)]
        key: SecretArgs,
    },

    /// Issue a credential locally and print the token
    Issue {
        #[clap(flatten)]
        key: SecretArgs,

        /// Subject DID
        #[clap(long)]
        subject: String,

        /// Achievement type, e.g. GithubActivity
        #[clap(long)]
        claim_type: String,

        #[clap(long)]
        metric: String,

        /// Reporting period, e.g. 2025-10
        #[clap(long)]
        period: String,

        /// Result value; parsed as JSON when possible, otherwise kept as a string
        #[clap(long)]
        value: String,

        /// Credential type listed after VerifiableCredential
        #[clap(long)]
        credential_type: Option<String>,

        /// Lifetime in seconds (at most 100 years)
        #[clap(long, value_parser = clap::value_parser!(i64).range(1..=MAX_LIFETIME_SECS))]
        expires_in: Option<i64>,

        /// Credential id (`jti`)
        #[clap(long)]
        id: Option<String>,
    },

    /// Decode a token without verifying it
    Inspect {
        /// Token, or `-` to read from stdin
        token: String,
    },

    /// Verify a token against its issuer's DID
    Verify {
        /// Token, or `-` to read from stdin
        token: String,

        /// Tolerated clock skew in seconds (at most one day)
        #[clap(
            long,
            default_value_t = DEFAULT_CLOCK_SKEW_SECS,
            value_parser = clap::value_parser!(i64).range(0..=MAX_CLOCK_SKEW_SECS)
        )]
        skew: i64,

        /// Print the verified credential as JSON
        #[clap(long)]
        json: bool,
    },

    /// Request credentials from issuer endpoints and verify each one
    Request {
        #[clap(flatten)]
        key: SecretArgs,

        /// Issuer endpoint, e.g. http://localhost:3001/issue-vc (repeatable)
        #[clap(long = "url", required = true)]
        urls: Vec<String>,

        /// Tolerated clock skew in seconds (at most one day)
        #[clap(
            long,
            default_value_t = DEFAULT_CLOCK_SKEW_SECS,
            value_parser = clap::value_parser!(i64).range(0..=MAX_CLOCK_SKEW_SECS)
        )]
        skew: i64,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn key_type(ed25519: bool) -> KeyType {
    if ed25519 {
        KeyType::Ed25519
    } else {
        KeyType::Secp256k1
    }
}

fn load_keypair(args: &SecretArgs) -> Result<KeyPair> {
    if let Some(path) = &args.key_file {
        return read_keypair_file(path);
    }
    let secret = args
        .secret
        .as_deref()
        .ok_or_else(|| anyhow!("Provide a private key with --secret, VOUCH_SECRET or --key-file"))?;
    KeyPair::from_hex(key_type(args.ed25519), secret).context("Invalid private key")
}

fn write_keypair_file(keypair: &KeyPair, path: &Path) -> Result<()> {
    let file = KeypairFileFormat {
        did: keypair.did.to_string(),
        key_type: keypair.key_type(),
        public_key: hex::encode(keypair.public_key()),
        secret_key: keypair.secret_hex().as_str().to_string(),
        generated_at: Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)
        .map_err(|e| anyhow!("Failed to write keypair to file '{}': {}", path.display(), e))
}

fn read_keypair_file(path: &Path) -> Result<KeyPair> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read keypair file '{}': {}", path.display(), e))?;
    let file: KeypairFileFormat = serde_json::from_str(&contents)
        .map_err(|e| anyhow!("Failed to parse keypair file '{}': {}", path.display(), e))?;

    let keypair = KeyPair::from_hex(file.key_type, &file.secret_key)
        .with_context(|| format!("Invalid secret key in '{}'", path.display()))?;
    if keypair.did.as_str() != file.did {
        bail!(
            "Keypair file '{}' is inconsistent: secret derives {} but file names {}",
            path.display(),
            keypair.did,
            file.did
        );
    }
    Ok(keypair)
}

/// Read a token argument, treating `-` as stdin.
fn read_token(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.trim().to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read token from stdin")?;
    Ok(buf.trim().to_string())
}

fn parse_claim_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn claim_body(metric: &str, period: &str, value: Value) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("metric".into(), Value::String(metric.to_string()));
    body.insert("period".into(), Value::String(period.to_string()));
    let mut result = Map::new();
    result.insert("value".into(), value);
    body.insert("result".into(), Value::Object(result));
    body
}

fn verifier(skew: i64) -> Result<Verifier> {
    let options = VerifierOptions::with_clock_skew(skew)?;
    Ok(Verifier::new(Arc::new(Resolver::default())).with_options(options))
}

fn print_verified(verified: &VerifiedCredential) {
    let vc = &verified.credential;
    let achievement = &vc.credential_subject.achievement;
    println!("{}", "Credential verified".green().bold());
    println!("Issuer:  {}", vc.issuer);
    println!("Subject: {}", vc.credential_subject.id);
    println!("Type:    {}", vc.credential_type().unwrap_or("VerifiableCredential"));
    println!("Issued:  {}", vc.issuance_date.to_rfc3339());
    if let Some(exp) = vc.expiration_date {
        println!("Expires: {}", exp.to_rfc3339());
    }
    println!("Claim:   {}", achievement.claim_type);
    for (field, value) in &achievement.body {
        println!("  {}: {}", field, value);
    }
}

fn keygen(ed25519: bool, output: Option<&Path>) -> Result<()> {
    let keypair = KeyPair::generate_with(key_type(ed25519));
    match output {
        Some(path) => {
            write_keypair_file(&keypair, path)?;
            println!("Keypair saved to: {}", path.display());
        }
        None => {
            println!("Secret: 0x{}", keypair.secret_hex().as_str());
        }
    }
    println!("DID: {}", keypair.did);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn issue(
    key: &SecretArgs,
    subject: &str,
    claim_type: &str,
    metric: &str,
    period: &str,
    value: &str,
    credential_type: Option<&str>,
    expires_in: Option<i64>,
    id: Option<&str>,
) -> Result<()> {
    let issuer = load_keypair(key)?;
    if let Err(e) = subject.parse::<vouch_identity::Did>() {
        return Err(format_did_error(&e, subject));
    }

    let issued_at = Utc::now();
    let mut builder = CredentialBuilder::new(
        issuer.did.as_str(),
        subject,
        claim_type,
        claim_body(metric, period, parse_claim_value(value)),
        issued_at,
    );
    if let Some(credential_type) = credential_type {
        builder = builder.credential_type(credential_type);
    }
    if let Some(secs) = expires_in {
        builder = builder.expires_in(secs);
    }
    if let Some(id) = id {
        builder = builder.id(id);
    }

    let credential = builder.build().context("Failed to build credential")?;
    let jwt = token::issue(&credential, &issuer).context("Failed to sign credential")?;
    debug!(issuer = %issuer.did, subject, "Issued credential");
    println!("{}", jwt);
    Ok(())
}

fn inspect(raw: &str) -> Result<()> {
    let jwt = read_token(raw)?;
    let parsed = token::parse(&jwt).map_err(|e| anyhow!("Malformed token: {}", e))?;

    println!("{}", "Header".bold());
    println!("{}", serde_json::to_string_pretty(parsed.header())?);
    println!("{}", "Payload".bold());
    println!("{}", serde_json::to_string_pretty(&parsed.claims)?);
    println!(
        "{} signature not checked; use `vouch verify`",
        "note:".yellow()
    );
    Ok(())
}

fn verify(raw: &str, skew: i64, json: bool) -> Result<()> {
    let jwt = read_token(raw)?;
    match verifier(skew)?.verify(&jwt) {
        Ok(verified) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&verified.credential)?);
            } else {
                print_verified(&verified);
            }
            Ok(())
        }
        Err(err) => {
            println!("{} {}", "Verification failed:".red().bold(), err.reason());
            Err(anyhow!(err))
        }
    }
}

async fn request(key: &SecretArgs, urls: &[String], skew: i64) -> Result<()> {
    let holder = load_keypair(key)?;
    let verifier = verifier(skew)?;
    let client = reqwest::Client::new();
    println!("Holder DID: {}", holder.did);

    let mut failures = 0usize;
    for url in urls {
        println!("\n-> {}", url);
        let jwt = match request_token(&client, url, holder.did.as_str()).await {
            Ok(jwt) => jwt,
            Err(e) => {
                warn!(url = %url, "Request failed: {:#}", e);
                println!("{} {:#}", "Request failed:".red(), e);
                failures += 1;
                continue;
            }
        };

        match verifier.verify(&jwt) {
            Ok(verified) => {
                print_verified(&verified);
                if verified.credential.credential_subject.id != holder.did {
                    println!("{} credential names a different subject", "warning:".yellow());
                }
                println!("Token: {}", jwt);
            }
            Err(err) => {
                println!("{} {} ({})", "Verification failed:".red(), err.reason(), err);
                failures += 1;
            }
        }
    }

    println!(
        "\n{} of {} credentials received and verified",
        urls.len() - failures,
        urls.len()
    );
    if failures > 0 {
        bail!("{} of {} requests failed", failures, urls.len());
    }
    Ok(())
}

async fn request_token(client: &reqwest::Client, url: &str, did: &str) -> Result<String> {
    let resp = client
        .post(url)
        .json(&serde_json::json!({ "did": did }))
        .send()
        .await
        .with_context(|| format!("Could not reach {}", url))?;
    let status = resp.status();
    let body = resp.text().await.context("Failed to read response body")?;
    if !status.is_success() {
        bail!("{} returned {}: {}", url, status, body);
    }
    Ok(body.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Keygen { ed25519, output } => keygen(*ed25519, output.as_deref())?,
        Commands::Did { key } => {
            let keypair = load_keypair(key)?;
            println!("{}", keypair.did);
        }
        Commands::Issue {
            key,
            subject,
            claim_type,
            metric,
            period,
            value,
            credential_type,
            expires_in,
            id,
        } => issue(
            key,
            subject,
            claim_type,
            metric,
            period,
            value,
            credential_type.as_deref(),
            *expires_in,
            id.as_deref(),
        )?,
        Commands::Inspect { token } => inspect(token)?,
        Commands::Verify { token, skew, json } => verify(token, *skew, *json)?,
        Commands::Request { key, urls, skew } => request(key, urls, *skew).await?,
    }

    Ok(())
}
