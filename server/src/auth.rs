//! Bearer tokens: HMAC-SHA256 signed claims.
//!
//! A token is `base64url(claims JSON) . base64url(HMAC-SHA256(claims))`.
//! The `sub` claim carries the user id the core keys everything by.

use crate::error::ServerError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime.
const TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Signed token claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Token mint/verify keyed by the deployment secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length")
    }

    /// Mint a token for a user.
    pub fn mint(&self, user_id: &str, name: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            exp: unix_now() + TOKEN_TTL.as_secs(),
        };
        self.mint_claims(&claims)
    }

    fn mint_claims(&self, claims: &Claims) -> String {
        let body = serde_json::to_vec(claims).expect("claims serialize");
        let mut mac = self.mac();
        mac.update(&body);
        let signature = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Verify a token's signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, ServerError> {
        let (body, signature) = token.split_once('.').ok_or(ServerError::InvalidToken)?;
        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| ServerError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ServerError::InvalidToken)?;
        let mut mac = self.mac();
        mac.update(&body);
        mac.verify_slice(&signature)
            .map_err(|_| ServerError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&body).map_err(|_| ServerError::InvalidToken)?;
        if claims.exp <= unix_now() {
            return Err(ServerError::TokenExpired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_verify_round_trip() {
        let signer = TokenSigner::new("test-secret");
        let token = signer.mint("u-1", "Ada");
        let claims = signer.verify(&token).expect("valid token");
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.name, "Ada");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenSigner::new("secret-a").mint("u-1", "Ada");
        assert_eq!(
            TokenSigner::new("secret-b").verify(&token),
            Err(ServerError::InvalidToken)
        );
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let signer = TokenSigner::new("test-secret");
        let token = signer.mint("u-1", "Ada");
        let (_, signature) = token.split_once('.').expect("two segments");
        let forged_body = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: "u-2".into(),
                name: "Eve".into(),
                exp: unix_now() + 3_600,
            })
            .expect("serializes"),
        );
        let forged = format!("{forged_body}.{signature}");
        assert_eq!(signer.verify(&forged), Err(ServerError::InvalidToken));
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = TokenSigner::new("test-secret");
        let token = signer.mint_claims(&Claims {
            sub: "u-1".into(),
            name: "Ada".into(),
            exp: unix_now().saturating_sub(10),
        });
        assert_eq!(signer.verify(&token), Err(ServerError::TokenExpired));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = TokenSigner::new("test-secret");
        assert_eq!(signer.verify("nonsense"), Err(ServerError::InvalidToken));
        assert_eq!(signer.verify("a.b.c"), Err(ServerError::InvalidToken));
        assert_eq!(signer.verify(""), Err(ServerError::InvalidToken));
    }
}
