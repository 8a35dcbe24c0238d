//! Access-token claim decoding.
//!
//! The portal never verifies token signatures; that is the identity service's
//! job. Claims are read only to make local, advisory authorization decisions,
//! so every decode failure degrades to "no permissions".

use std::collections::BTreeSet;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::Permission;

/// Standard alphabet, padding optional (payload segments are unpadded).
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims the portal reads from an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject, if the payload names one.
    pub sub: Option<String>,

    /// Granted permissions. Empty unless the payload has a `permissions` array.
    pub permissions: BTreeSet<Permission>,

    /// Expiration timestamp (`exp`, seconds since epoch), if present.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessClaims {
    /// Tokens without `exp` never expire locally.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not three dot-separated segments")]
    Structure,

    #[error("payload segment is empty")]
    EmptyPayload,

    #[error("payload is not valid base64: {0}")]
    Base64(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Decode the payload segment of a compact token.
pub fn decode_claims(token: &str) -> Result<AccessClaims, ClaimsError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::Structure);
    }

    let payload = segments[1];
    if payload.is_empty() {
        return Err(ClaimsError::EmptyPayload);
    }

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE
        .decode(standard.as_bytes())
        .map_err(|e| ClaimsError::Base64(e.to_string()))?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))?;
    let object = value.as_object().ok_or(ClaimsError::NotAnObject)?;

    let permissions = match object.get("permissions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|p| Permission::from(p.to_string()))
            .collect(),
        _ => BTreeSet::new(),
    };

    let sub = object.get("sub").and_then(Value::as_str).map(str::to_string);

    let expires_at = object
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Ok(AccessClaims {
        sub,
        permissions,
        expires_at,
    })
}

/// Permissions granted by a token; empty on any decode failure.
pub fn permissions_from_token(token: &str) -> BTreeSet<Permission> {
    match decode_claims(token) {
        Ok(claims) => claims.permissions,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring undecodable access token claims");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    fn mint(claims: &Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("failed to encode jwt")
    }

    fn token_with_payload(payload: &[u8]) -> String {
        format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn reads_permissions_from_a_real_jwt() {
        let token = mint(&json!({
            "sub": "auth0|42",
            "permissions": ["read:admin", "write:data"],
            "exp": 4_102_444_800_i64,
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("auth0|42"));
        assert!(claims.permissions.contains(&Permission::new("read:admin")));
        assert!(claims.permissions.contains(&Permission::new("write:data")));
        assert!(!claims.is_expired(Utc::now()));
    }

    #[test]
    fn url_safe_characters_are_translated() {
        // Leading whitespace shifts the alignment until the encoding needs '-' or '_'.
        let payload = (0..3)
            .map(|pad| format!("{}{}", " ".repeat(pad), r#"{"permissions":["read:conductor"],"note":"??>>~~~"}"#))
            .find(|p| {
                let encoded = URL_SAFE_NO_PAD.encode(p.as_bytes());
                encoded.contains('-') || encoded.contains('_')
            })
            .expect("some alignment uses the url-safe alphabet");

        let perms = permissions_from_token(&token_with_payload(payload.as_bytes()));
        assert_eq!(perms, BTreeSet::from([Permission::new("read:conductor")]));
    }

    #[test]
    fn non_array_permissions_yield_empty() {
        for payload in [
            json!({ "permissions": "read:admin" }),
            json!({ "permissions": { "read": "admin" } }),
            json!({ "permissions": null }),
            json!({ "scope": "openid" }),
        ] {
            let token = token_with_payload(payload.to_string().as_bytes());
            assert!(permissions_from_token(&token).is_empty(), "{payload}");
        }
    }

    #[test]
    fn non_string_array_items_are_skipped() {
        let token = token_with_payload(br#"{"permissions":["read:admin",7,null]}"#);
        assert_eq!(
            permissions_from_token(&token),
            BTreeSet::from([Permission::new("read:admin")])
        );
    }

    #[test]
    fn malformed_tokens_classify_and_degrade() {
        assert_eq!(decode_claims(""), Err(ClaimsError::Structure));
        assert_eq!(decode_claims("only-one-segment"), Err(ClaimsError::Structure));
        assert_eq!(decode_claims("a..c"), Err(ClaimsError::EmptyPayload));
        assert!(matches!(decode_claims("a.!!!.c"), Err(ClaimsError::Base64(_))));
        assert!(matches!(
            decode_claims(&token_with_payload(b"not json")),
            Err(ClaimsError::Json(_))
        ));
        assert_eq!(
            decode_claims(&token_with_payload(b"[1,2]")),
            Err(ClaimsError::NotAnObject)
        );

        for token in ["", "mock-jwt-token", "a..c", "a.!!!.c", "x.y.z.w"] {
            assert!(permissions_from_token(token).is_empty(), "{token}");
        }
    }

    #[test]
    fn expiry_is_read_from_exp() {
        let token = token_with_payload(br#"{"exp":1000}"#);
        let claims = decode_claims(&token).unwrap();
        assert!(claims.is_expired(Utc::now()));

        let no_exp = decode_claims(&token_with_payload(b"{}")).unwrap();
        assert!(!no_exp.is_expired(Utc::now()));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: arbitrary strings never panic.
            #[test]
            fn arbitrary_input_never_panics(token in ".{0,64}") {
                let _ = permissions_from_token(&token);
            }

            /// Property: garbage payload bytes always degrade to empty.
            #[test]
            fn garbage_payload_is_empty(bytes in prop::collection::vec(any::<u8>(), 0..48)) {
                prop_assume!(serde_json::from_slice::<Value>(&bytes).is_err());
                prop_assert!(permissions_from_token(&token_with_payload(&bytes)).is_empty());
            }
        }
    }
}
