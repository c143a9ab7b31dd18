//! Digest authentication.
//!
//! A device with authentication enabled answers the first request with a
//! 401 error whose message is a JSON challenge. The client answers by
//! attaching an [`AuthParams`] block whose `response` is
//!
//! ```text
//! sha256(sha256("admin:<realm>:<password>") ":" nonce ":" nc ":" cnonce ":auth:" sha256("dummy_method:dummy_uri"))
//! ```

use crate::error::{Result, ShellyError};
use crate::protocol::AuthParams;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// The only user name devices accept
pub const AUTH_USER: &str = "admin";
/// The only supported challenge type
pub const AUTH_TYPE_DIGEST: &str = "digest";
/// The only supported hash algorithm
pub const AUTH_ALGORITHM: &str = "SHA-256";

const DUMMY_METHOD: &str = "dummy_method";
const DUMMY_URI: &str = "dummy_uri";

/// Challenge sent by the device in the message of a 401 error
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    pub auth_type: String,
    pub nonce: u64,
    #[serde(default)]
    pub nc: Option<u64>,
    pub realm: String,
    pub algorithm: String,
}

impl AuthChallenge {
    /// Parse and validate the challenge carried by a 401 error message
    pub fn parse(message: &str) -> Result<Self> {
        let challenge: AuthChallenge = serde_json::from_str(message)
            .map_err(|e| ShellyError::InvalidChallenge(format!("{e}: {message}")))?;

        if challenge.auth_type != AUTH_TYPE_DIGEST {
            return Err(ShellyError::UnsupportedAuth(format!(
                "auth type {}",
                challenge.auth_type
            )));
        }
        if challenge.algorithm != AUTH_ALGORITHM {
            return Err(ShellyError::UnsupportedAuth(format!(
                "algorithm {}",
                challenge.algorithm
            )));
        }

        Ok(challenge)
    }
}

/// Credentials derived from one answered challenge.
///
/// Valid for the connection it was computed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    params: AuthParams,
}

impl AuthContext {
    /// Answer a challenge with a freshly generated client nonce
    pub fn answer(challenge: &AuthChallenge, password: &str) -> Self {
        let cnonce = u64::from(rand::random::<u32>());
        Self::answer_with_cnonce(challenge, password, cnonce)
    }

    /// Answer a challenge with a given client nonce
    pub fn answer_with_cnonce(challenge: &AuthChallenge, password: &str, cnonce: u64) -> Self {
        let response = digest_response(
            &challenge.realm,
            password,
            challenge.nonce,
            challenge.nc.unwrap_or(1),
            cnonce,
        );

        Self {
            params: AuthParams {
                realm: challenge.realm.clone(),
                username: AUTH_USER.to_string(),
                nonce: challenge.nonce,
                cnonce,
                response,
                algorithm: AUTH_ALGORITHM.to_string(),
            },
        }
    }

    /// The block to attach to requests
    pub fn params(&self) -> &AuthParams {
        &self.params
    }
}

/// Compute the digest `response` token
pub fn digest_response(realm: &str, password: &str, nonce: u64, nc: u64, cnonce: u64) -> String {
    let ha1 = sha256_hex(&format!("{AUTH_USER}:{realm}:{password}"));
    let ha2 = sha256_hex(&format!("{DUMMY_METHOD}:{DUMMY_URI}"));
    sha256_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
