use assert_matches::assert_matches;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use vouch_crypto::{sign_compact, JwsHeader, SignatureError};
use vouch_identity::token::{self, CredentialClaims};
use vouch_identity::{
    verify, Algorithm, Credential, CredentialBuilder, CredentialError, InvalidClockSkew, KeyPair,
    KeyType, MalformedToken, ResolveError, Resolver, VerificationError, Verifier, VerifierOptions,
    MAX_CLOCK_SKEW_SECS, MAX_LIFETIME_SECS,
};

fn issued_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap()
}

fn github_activity() -> Map<String, Value> {
    let body = json!({
        "metric": "Commit Count",
        "period": "2025-10",
        "result": { "value": 142 },
    });
    match body {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn issuer() -> KeyPair {
    KeyPair::derive(&[2u8; 32]).unwrap()
}

fn holder() -> KeyPair {
    KeyPair::derive(&[3u8; 32]).unwrap()
}

fn credential(issuer: &KeyPair, subject: &KeyPair) -> Credential {
    CredentialBuilder::new(
        issuer.did.as_str(),
        subject.did.as_str(),
        "GithubActivity",
        github_activity(),
        issued_at(),
    )
    .credential_type("RndPerformanceCredential")
    .build()
    .unwrap()
}

fn verifier() -> Verifier {
    Verifier::new(Arc::new(Resolver::default()))
}

fn segments(token: &str) -> Vec<String> {
    token.split('.').map(str::to_string).collect()
}

#[test]
fn issue_and_verify_round_trip() {
    let (iss, sub) = (issuer(), holder());
    assert_eq!(
        iss.did.as_str(),
        "did:key:zQ3shScWratmosu8R95gHDdPPypPdxht5hkJ16K2Pv7NWWW4m"
    );

    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let verified = verifier()
        .verify_at(&token, issued_at() + Duration::minutes(1))
        .unwrap();

    assert_eq!(verified.issuer_key.key_type, KeyType::Secp256k1);
    assert_eq!(verified.issuer_key.public_key, iss.public_key());
    assert_eq!(verified.header.alg, "ES256K");

    let vc = verified.credential;
    assert_eq!(vc.issuer, iss.did);
    assert_eq!(vc.credential_subject.id, sub.did);
    assert_eq!(vc.credential_type(), Some("RndPerformanceCredential"));
    assert_eq!(vc.issuance_date, issued_at());

    let achievement = &vc.credential_subject.achievement;
    assert_eq!(achievement.claim_type, "GithubActivity");
    assert_eq!(achievement.body["metric"], "Commit Count");
    assert_eq!(achievement.body["period"], "2025-10");
    assert_eq!(achievement.body["result"]["value"], 142);
}

#[test]
fn wire_layout() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let parts = segments(&token);
    assert_eq!(parts.len(), 3);

    let header = URL_SAFE_NO_PAD.decode(&parts[0]).unwrap();
    assert_eq!(header, br#"{"alg":"ES256K","typ":"JWT"}"#);

    let payload: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
    let keys: Vec<&str> = payload.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["iss", "sub", "iat", "nbf", "vc"]);
    assert_eq!(payload["iat"], issued_at().timestamp());
    assert_eq!(payload["nbf"], issued_at().timestamp());
    assert_eq!(
        payload["vc"],
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", "RndPerformanceCredential"],
            "credentialSubject": {
                "achievement": {
                    "type": "GithubActivity",
                    "metric": "Commit Count",
                    "period": "2025-10",
                    "result": { "value": 142 }
                }
            }
        })
    );

    assert_eq!(URL_SAFE_NO_PAD.decode(&parts[2]).unwrap().len(), 64);
}

#[test]
fn issuing_is_deterministic_for_same_inputs() {
    let (iss, sub) = (issuer(), holder());
    let a = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let b = token::issue(&credential(&iss, &sub), &iss).unwrap();
    // RFC 6979 nonces make ECDSA signatures deterministic too.
    assert_eq!(a, b);
}

#[test]
fn any_signature_bit_flip_is_rejected() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let parts = segments(&token);
    let signature = URL_SAFE_NO_PAD.decode(&parts[2]).unwrap();
    let verifier = verifier();
    let now = issued_at();

    for bit in 0..signature.len() * 8 {
        let mut flipped = signature.clone();
        flipped[bit / 8] ^= 1 << (bit % 8);
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            parts[1],
            URL_SAFE_NO_PAD.encode(&flipped)
        );
        assert_matches!(
            verifier.verify_at(&forged, now),
            Err(VerificationError::SignatureInvalid(_)),
            "bit {} was not detected",
            bit
        );
    }
}

#[test]
fn substituted_payload_is_rejected() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let parts = segments(&token);

    let mut claims = CredentialClaims::from(&credential(&iss, &sub));
    claims.vc.credential_subject.achievement.body["result"]["value"] = json!(9001);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let forged = format!("{}.{}.{}", parts[0], payload, parts[2]);

    assert_matches!(
        verifier().verify_at(&forged, issued_at()),
        Err(VerificationError::SignatureInvalid(SignatureError::Mismatch))
    );
}

#[test]
fn wrong_issuer_key_is_rejected() {
    let (iss, sub) = (issuer(), holder());
    let impostor = KeyPair::generate();
    // Claims name `iss` but are signed by someone else.
    let token = token::sign(&credential(&iss, &sub), Algorithm::ES256K, |input| {
        impostor.sign(input)
    })
    .unwrap();

    assert_matches!(
        verifier().verify_at(&token, issued_at()),
        Err(VerificationError::SignatureInvalid(_))
    );
}

#[test]
fn unregistered_method_is_unresolvable() {
    let (iss, sub) = (issuer(), holder());
    let mut claims = CredentialClaims::from(&credential(&iss, &sub));
    claims.iss = "did:web:issuer.example".to_string();
    let token = sign_compact(&JwsHeader::jwt(Algorithm::ES256K), &claims, |input| {
        iss.sign(input)
    })
    .unwrap();

    assert_matches!(
        verifier().verify_at(&token, issued_at()),
        Err(VerificationError::UnresolvableIssuer { issuer, source: ResolveError::UnsupportedMethod(m) })
            if issuer == "did:web:issuer.example" && m == "web"
    );

    // Same outcome for a registered-looking method when the registry is empty.
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let empty = Verifier::new(Arc::new(Resolver::new([])));
    let err = empty.verify_at(&token, issued_at()).unwrap_err();
    assert_eq!(err.reason(), "unresolvable_issuer");
}

#[test]
fn malformed_issuer_is_unresolvable() {
    let (iss, sub) = (issuer(), holder());
    let mut claims = CredentialClaims::from(&credential(&iss, &sub));
    claims.iss = "did:key:zNotAKey".to_string();
    let token = sign_compact(&JwsHeader::jwt(Algorithm::ES256K), &claims, |input| {
        iss.sign(input)
    })
    .unwrap();

    assert_matches!(
        verifier().verify_at(&token, issued_at()),
        Err(VerificationError::UnresolvableIssuer {
            source: ResolveError::MalformedIdentifier(_),
            ..
        })
    );
}

#[test]
fn structural_damage_is_malformed() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let parts = segments(&token);
    let verifier = verifier();
    let now = issued_at();

    let truncated_payload = format!("{}.{}.{}", parts[0], &parts[1][..parts[1].len() / 2], parts[2]);
    let two_parts = format!("{}.{}", parts[0], parts[1]);
    let empty_signature = format!("{}.{}.", parts[0], parts[1]);
    let not_json = format!(
        "{}.{}.{}",
        parts[0],
        URL_SAFE_NO_PAD.encode(b"vouch"),
        parts[2]
    );

    for bad in [
        truncated_payload.as_str(),
        two_parts.as_str(),
        empty_signature.as_str(),
        not_json.as_str(),
        "",
        "a.b.c.d",
    ] {
        let err = verifier.verify_at(bad, now).unwrap_err();
        assert_matches!(err, VerificationError::MalformedToken(_), "token {:?}", bad);
        assert_eq!(err.reason(), "malformed_token");
    }
}

#[test]
fn payload_truncated_by_one_character_fails_to_parse() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let parts = segments(&token);
    let truncated = format!(
        "{}.{}.{}",
        parts[0],
        &parts[1][..parts[1].len() - 1],
        parts[2]
    );

    assert!(token::parse(&token).is_ok());
    assert!(token::parse(&truncated).is_err());
    assert_matches!(
        verifier().verify_at(&truncated, issued_at()),
        Err(VerificationError::MalformedToken(_))
    );
}

#[test]
fn missing_claims_are_malformed() {
    let iss = issuer();
    let token = sign_compact(
        &JwsHeader::jwt(Algorithm::ES256K),
        &json!({"iss": iss.did.as_str(), "iat": 1}),
        |input| iss.sign(input),
    )
    .unwrap();

    assert_matches!(
        token::parse(&token),
        Err(MalformedToken::MissingClaim("sub"))
    );
}

#[test]
fn unknown_algorithm_is_rejected() {
    let (iss, sub) = (issuer(), holder());
    let claims = CredentialClaims::from(&credential(&iss, &sub));
    let header = JwsHeader {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };
    let token = sign_compact(&header, &claims, |input| iss.sign(input)).unwrap();

    assert_matches!(
        verifier().verify_at(&token, issued_at()),
        Err(VerificationError::UnsupportedAlgorithm(alg)) if alg == "HS256"
    );
}

#[test]
fn algorithm_key_mismatch_is_signature_invalid() {
    let (iss, sub) = (issuer(), holder());
    let claims = CredentialClaims::from(&credential(&iss, &sub));
    let token = sign_compact(&JwsHeader::jwt(Algorithm::EdDSA), &claims, |input| {
        iss.sign(input)
    })
    .unwrap();

    assert_matches!(
        verifier().verify_at(&token, issued_at()),
        Err(VerificationError::SignatureInvalid(SignatureError::KeyTypeMismatch { .. }))
    );
}

#[test]
fn future_issuance_is_not_yet_valid() {
    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let now = issued_at() - Duration::minutes(10);

    let err = verifier().verify_at(&token, now).unwrap_err();
    assert_matches!(
        &err,
        VerificationError::NotYetValid { valid_from, .. } if *valid_from == issued_at()
    );
    assert_eq!(err.reason(), "not_yet_valid");

    // Small drift is tolerated.
    assert!(verifier()
        .verify_at(&token, issued_at() - Duration::minutes(4))
        .is_ok());
}

#[test]
fn expiry_is_enforced_with_skew() {
    let (iss, sub) = (issuer(), holder());
    let expires_at = issued_at() + Duration::hours(1);
    let credential = CredentialBuilder::new(
        iss.did.as_str(),
        sub.did.as_str(),
        "GithubActivity",
        github_activity(),
        issued_at(),
    )
    .expires_at(expires_at)
    .build()
    .unwrap();
    let token = token::issue(&credential, &iss).unwrap();
    let verifier = verifier();

    assert!(verifier.verify_at(&token, expires_at - Duration::seconds(1)).is_ok());
    assert!(verifier.verify_at(&token, expires_at + Duration::minutes(2)).is_ok());
    assert_matches!(
        verifier.verify_at(&token, expires_at + Duration::minutes(6)),
        Err(VerificationError::Expired { expired_at, .. }) if expired_at == expires_at
    );

    let strict = verifier
        .clone()
        .with_options(VerifierOptions::with_clock_skew(0).unwrap());
    assert_matches!(
        strict.verify_at(&token, expires_at),
        Err(VerificationError::Expired { .. })
    );
}

#[test]
fn clock_skew_is_bounded() {
    for secs in [-600, -1, MAX_CLOCK_SKEW_SECS + 1, i64::MAX, i64::MIN] {
        assert_eq!(
            VerifierOptions::with_clock_skew(secs),
            Err(InvalidClockSkew(secs))
        );
    }
    let widest = VerifierOptions::with_clock_skew(MAX_CLOCK_SKEW_SECS).unwrap();
    assert_eq!(widest.clock_skew(), Duration::days(1));

    let (iss, sub) = (issuer(), holder());
    let token = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let verifier = verifier().with_options(widest);
    assert!(verifier.verify_at(&token, issued_at()).is_ok());
    assert!(verifier
        .verify_at(&token, issued_at() - Duration::hours(23))
        .is_ok());
}

#[test]
fn window_check_saturates_at_extreme_clocks() {
    let (iss, sub) = (issuer(), holder());
    let lasting = CredentialBuilder::new(
        iss.did.as_str(),
        sub.did.as_str(),
        "GithubActivity",
        github_activity(),
        issued_at(),
    )
    .expires_in(3600)
    .build()
    .unwrap();
    let open_ended = token::issue(&credential(&iss, &sub), &iss).unwrap();
    let expiring = token::issue(&lasting, &iss).unwrap();
    let verifier = verifier();

    assert!(verifier.verify_at(&open_ended, DateTime::<Utc>::MAX_UTC).is_ok());
    assert_matches!(
        verifier.verify_at(&expiring, DateTime::<Utc>::MAX_UTC),
        Err(VerificationError::Expired { .. })
    );
    assert_matches!(
        verifier.verify_at(&expiring, DateTime::<Utc>::MIN_UTC),
        Err(VerificationError::NotYetValid { .. })
    );
}

#[test]
fn lifetimes_are_bounded() {
    let (iss, sub) = (issuer(), holder());
    let builder = CredentialBuilder::new(
        iss.did.as_str(),
        sub.did.as_str(),
        "GithubActivity",
        github_activity(),
        issued_at(),
    );

    let vc = builder.clone().expires_in(3600).build().unwrap();
    assert_eq!(vc.expiration_date, Some(issued_at() + Duration::hours(1)));
    let vc = builder.clone().expires_in(MAX_LIFETIME_SECS).build().unwrap();
    assert!(vc.expiration_date.is_some());

    for secs in [0, -1, -3600, MAX_LIFETIME_SECS + 1, i64::MAX, i64::MIN] {
        assert_matches!(
            builder.clone().expires_in(secs).build(),
            Err(CredentialError::InvalidLifetime(s)) if s == secs
        );
    }
}

#[test]
fn ed25519_issuer_round_trip() {
    let iss = KeyPair::derive_with(KeyType::Ed25519, &[9u8; 32]).unwrap();
    let sub = KeyPair::generate_with(KeyType::Ed25519);
    let credential = CredentialBuilder::new(
        iss.did.as_str(),
        sub.did.as_str(),
        "SaaSActivity",
        Map::new(),
        Utc::now(),
    )
    .build()
    .unwrap();

    let token = token::issue(&credential, &iss).unwrap();
    let parsed = token::parse(&token).unwrap();
    assert_eq!(parsed.header().alg, "EdDSA");

    let verified = verify(&token, &Resolver::default()).unwrap();
    assert_eq!(verified.issuer_key.key_type, KeyType::Ed25519);
    assert_eq!(verified.credential.credential_subject.id, sub.did);
    assert_eq!(
        verified.credential.credential_type(),
        Some("AchievementCredential")
    );
}

#[test]
fn optional_claims_survive_verification() {
    let (iss, sub) = (issuer(), holder());
    let credential = CredentialBuilder::new(
        iss.did.as_str(),
        sub.did.as_str(),
        "B2BContract",
        github_activity(),
        issued_at(),
    )
    .id("urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5")
    .context("https://vouch.example/contexts/achievement/v1")
    .build()
    .unwrap();
    let token = token::issue(&credential, &iss).unwrap();

    let verified = verifier().verify_at(&token, issued_at()).unwrap();
    assert_eq!(verified.credential, credential);
}
