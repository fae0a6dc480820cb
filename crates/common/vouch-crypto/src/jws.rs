use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::Algorithm;

/// Separator between the three compact segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Error types for compact JWS operations
#[derive(Error, Debug)]
pub enum JwsError {
    #[error("failed to serialize JWS header or payload: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("invalid JWS structure: expected 3 parts separated by '.', found {actual_parts} parts")]
    IncorrectJwsPartsCount { actual_parts: usize },

    #[error("JWS {segment} segment is empty")]
    EmptySegment { segment: Segment },

    #[error("JWS {segment} segment is not valid base64url: {source}")]
    Base64 {
        segment: Segment,
        #[source]
        source: base64::DecodeError,
    },

    #[error("JWS {segment} segment is not a valid JSON object: {source}")]
    Json {
        segment: Segment,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for JWS operations
pub type Result<T> = std::result::Result<T, JwsError>;

/// Names the compact segment a decoding error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Header,
    Payload,
    Signature,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Header => f.write_str("header"),
            Segment::Payload => f.write_str("payload"),
            Segment::Signature => f.write_str("signature"),
        }
    }
}

/// JWS Header structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl JwsHeader {
    /// Header for a JWT signed with `alg`.
    pub fn jwt(alg: Algorithm) -> Self {
        Self {
            alg: alg.as_str().to_string(),
            typ: Some("JWT".to_string()),
        }
    }
}

/// Base64url-encode the compact JSON form of `value`.
///
/// `serde_json` writes struct fields in declaration order with no whitespace,
/// so the same value always produces the same segment.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(JwsError::Serialization)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Produce a compact JWS `header.payload.signature`.
///
/// `sign` receives the exact UTF-8 bytes of `header_b64 + "." + payload_b64`
/// and returns raw signature bytes.
pub fn sign_compact<P, F>(header: &JwsHeader, payload: &P, sign: F) -> Result<String>
where
    P: Serialize,
    F: FnOnce(&[u8]) -> Vec<u8>,
{
    let header_b64 = encode_segment(header)?;
    let payload_b64 = encode_segment(payload)?;
    let signing_input = format!("{}{}{}", header_b64, SEGMENT_SEPARATOR, payload_b64);

    let signature = sign(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}{}{}", signing_input, SEGMENT_SEPARATOR, signature_b64))
}

/// A compact JWS split into its parts.
///
/// The original encoded segments are retained: the signature covers those
/// exact bytes, never a re-serialization of the decoded header or payload.
#[derive(Debug, Clone)]
pub struct CompactJws {
    header_b64: String,
    payload_b64: String,
    pub header: JwsHeader,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CompactJws {
    /// Split and decode a compact JWS. Does not verify the signature.
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split(SEGMENT_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(JwsError::IncorrectJwsPartsCount {
                actual_parts: parts.len(),
            });
        }

        let header_bytes = decode_segment(parts[0], Segment::Header)?;
        let payload = decode_segment(parts[1], Segment::Payload)?;
        let signature = decode_segment(parts[2], Segment::Signature)?;

        let header: JwsHeader = serde_json::from_slice(&header_bytes).map_err(|source| {
            JwsError::Json {
                segment: Segment::Header,
                source,
            }
        })?;

        Ok(Self {
            header_b64: parts[0].to_string(),
            payload_b64: parts[1].to_string(),
            header,
            payload,
            signature,
        })
    }

    /// The bytes the signature was computed over.
    pub fn signing_input(&self) -> String {
        format!("{}{}{}", self.header_b64, SEGMENT_SEPARATOR, self.payload_b64)
    }

    /// Deserialize the decoded payload as JSON.
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|source| JwsError::Json {
            segment: Segment::Payload,
            source,
        })
    }
}

fn decode_segment(segment_b64: &str, segment: Segment) -> Result<Vec<u8>> {
    if segment_b64.is_empty() {
        return Err(JwsError::EmptySegment { segment });
    }
    URL_SAFE_NO_PAD
        .decode(segment_b64)
        .map_err(|source| JwsError::Base64 { segment, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn header_encoding_is_canonical() {
        let header = JwsHeader::jwt(Algorithm::ES256K);
        assert_eq!(
            encode_segment(&header).unwrap(),
            URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#)
        );
    }

    #[test]
    fn sign_fn_sees_exact_signing_input() {
        let header = JwsHeader::jwt(Algorithm::EdDSA);
        let mut seen = Vec::new();
        let token = sign_compact(&header, &json!({"iss": "a"}), |input| {
            seen = input.to_vec();
            vec![7u8; 64]
        })
        .unwrap();

        let parsed = CompactJws::parse(&token).unwrap();
        assert_eq!(parsed.signing_input().as_bytes(), seen.as_slice());
        assert_eq!(parsed.signature, vec![7u8; 64]);
        assert_eq!(parsed.header, header);
    }

    #[test]
    fn wrong_part_count() {
        assert_matches!(
            CompactJws::parse("a.b"),
            Err(JwsError::IncorrectJwsPartsCount { actual_parts: 2 })
        );
        assert_matches!(
            CompactJws::parse("a.b.c.d"),
            Err(JwsError::IncorrectJwsPartsCount { actual_parts: 4 })
        );
    }

    #[test]
    fn padded_or_invalid_segment_rejected() {
        let header = encode_segment(&JwsHeader::jwt(Algorithm::ES256K)).unwrap();
        let token = format!("{}.e30=.AAAA", header);
        assert_matches!(
            CompactJws::parse(&token),
            Err(JwsError::Base64 { segment: Segment::Payload, .. })
        );
    }

    #[test]
    fn header_must_be_json_object() {
        let token = format!("{}.e30.AAAA", URL_SAFE_NO_PAD.encode(b"not json"));
        assert_matches!(
            CompactJws::parse(&token),
            Err(JwsError::Json { segment: Segment::Header, .. })
        );
    }
}
