//! Agent-to-agent OAuth: the `client_credentials` grant the router issues
//! against the configured SSO provider, and JWT verification against a
//! lazily-cached, TTL-refreshed JWKS.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration as StdDuration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};

/// Claim skew tolerance for expiry/not-before checks.
pub const CLOCK_SKEW_SECONDS: u64 = 30;
const JWKS_CACHE_TTL: StdDuration = StdDuration::from_secs(600);

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub issuer: String,
    pub audience: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: Option<i64>,
    pub sub: String,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

struct CachedJwks {
    fetched_at: Instant,
    keys: HashMap<String, Jwk>,
}

/// Caches the provider's JWKS document, refreshing once automatically on a
/// key-id miss (covers provider key rotation) or once the TTL expires.
pub struct JwksCache {
    jwks_uri: String,
    client: reqwest::Client,
    cached: RwLock<Option<CachedJwks>>,
}

impl JwksCache {
    #[must_use]
    pub fn new(jwks_uri: String) -> Self {
        Self { jwks_uri, client: reqwest::Client::new(), cached: RwLock::new(None) }
    }

    async fn fetch(&self) -> RouterResult<HashMap<String, Jwk>> {
        let doc: JwksDocument = self.client.get(&self.jwks_uri).send().await?.json().await?;
        Ok(doc.keys.into_iter().map(|k| (k.kid.clone(), k)).collect())
    }

    async fn refresh(&self) -> RouterResult<()> {
        let keys = self.fetch().await?;
        *self.cached.write().expect("jwks lock poisoned") = Some(CachedJwks { fetched_at: Instant::now(), keys });
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> RouterResult<DecodingKey> {
        let stale = {
            let guard = self.cached.read().expect("jwks lock poisoned");
            match &*guard {
                Some(cached) if cached.fetched_at.elapsed() < JWKS_CACHE_TTL && cached.keys.contains_key(kid) => {
                    return build_decoding_key(&cached.keys[kid]);
                }
                Some(cached) => !cached.keys.contains_key(kid) || cached.fetched_at.elapsed() >= JWKS_CACHE_TTL,
                None => true,
            }
        };
        if stale {
            self.refresh().await?;
        }
        let guard = self.cached.read().expect("jwks lock poisoned");
        let cached = guard.as_ref().ok_or(RouterError::Unauthorized)?;
        let jwk = cached.keys.get(kid).ok_or(RouterError::Unauthorized)?;
        build_decoding_key(jwk)
    }
}

fn build_decoding_key(jwk: &Jwk) -> RouterResult<DecodingKey> {
    DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|_| RouterError::Unauthorized)
}

/// Verify `token`'s signature against the cached JWKS and validate
/// issuer/audience/expiry (with skew)/not-before/nonce.
pub async fn verify(jwks: &JwksCache, config: &OAuthConfig, token: &str, expected_nonce: Option<&str>) -> RouterResult<Claims> {
    let header = decode_header(token).map_err(|_| RouterError::Unauthorized)?;
    let kid = header.kid.ok_or(RouterError::Unauthorized)?;
    let key = jwks.key_for(&kid).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[&config.audience]);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = CLOCK_SKEW_SECONDS;

    let data = decode::<Claims>(token, &key, &validation).map_err(|_| RouterError::Unauthorized)?;

    if let Some(expected) = expected_nonce {
        if data.claims.nonce.as_deref() != Some(expected) {
            return Err(RouterError::Unauthorized);
        }
    }

    Ok(data.claims)
}

/// Request body for `POST /auth/agent-token`.
#[derive(Debug, Deserialize)]
pub struct ClientCredentialsRequest {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Exchange validated client credentials for an access token by
/// forwarding the grant to the configured provider's token endpoint.
pub async fn client_credentials_grant(
    client: &reqwest::Client,
    config: &OAuthConfig,
    req: &ClientCredentialsRequest,
) -> RouterResult<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", req.client_id.as_str()),
            ("client_secret", req.client_secret.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(RouterError::InvalidClientCredentials);
    }

    #[derive(Deserialize)]
    struct ProviderResponse {
        access_token: String,
        expires_in: i64,
    }
    let body: ProviderResponse = response.json().await.map_err(RouterError::JwksFetch)?;

    Ok(TokenResponse { access_token: body.access_token, token_type: "Bearer", expires_in: body.expires_in })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_skew_constant_is_thirty_seconds() {
        assert_eq!(CLOCK_SKEW_SECONDS, 30);
    }
}
