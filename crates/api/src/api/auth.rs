// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{path::Path, time::Duration};

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{PasswordHasher, SaltString},
};
use base64::prelude::*;
use ed25519_dalek::{
    Signature, SignatureError, SigningKey, Verifier, VerifyingKey, ed25519::signature::Signer,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::db::models::UserRole;

#[derive(Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "Inner: Serialize + DeserializeOwned")]
pub struct JwtPayload<Inner: DeserializeOwned> {
    #[serde(flatten)]
    pub custom_fields: Inner,
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl<Inner: DeserializeOwned> JwtPayload<Inner> {
    pub fn new_with_duration(
        sub: String,
        iss: String,
        custom_fields: Inner,
        valid_duration: Duration,
    ) -> Self {
        let current_time = chrono::Utc::now().timestamp();
        Self {
            sub,
            iss,
            custom_fields,
            iat: current_time,
            exp: current_time + valid_duration.as_secs() as i64,
        }
    }

    pub fn is_valid_now(&self) -> bool {
        chrono::Utc::now().timestamp() <= self.exp
    }
}

#[derive(Serialize, Deserialize)]
pub struct AuthJwtPayload {
    pub email: String,
    pub role: UserRole,
}

#[derive(Error, Debug)]
pub enum JwtValidationError {
    #[error("Invalid JWT format")]
    InvalidFormat,
    #[error("Base64 decoding error: {0}")]
    Base64DecodingError(#[from] base64::DecodeError),
    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid JWT signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("JWT parsing error: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("JWT has expired")]
    Expired,
}

#[derive(Error, Debug)]
pub enum JwtGenerationError {
    #[error("JWT signing error: {0}")]
    SigningError(#[from] SignatureError),
    #[error("JWT serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing error: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("Invalid argon2 parameters: {0}")]
    Params(argon2::Error),
}

#[derive(Error, Debug)]
pub enum SigningKeyError {
    #[error("Signing key I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Signing key format error: {0}")]
    Format(#[from] serde_json::Error),
}

const JWT_ALG: &str = "EdDSA";

fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(BASE64_URL_SAFE.encode(serde_json::to_vec(value)?))
}

/// Checks the header and signature, returning the decoded payload segment.
fn verified_payload(
    token: &str,
    verifying_key: &VerifyingKey,
) -> Result<Vec<u8>, JwtValidationError> {
    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or(JwtValidationError::InvalidFormat)?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(JwtValidationError::InvalidFormat)?;
    if payload.contains('.') {
        return Err(JwtValidationError::InvalidFormat);
    }

    let header: JwtHeader = serde_json::from_slice(&BASE64_URL_SAFE.decode(header)?)?;
    if header.alg != JWT_ALG {
        return Err(JwtValidationError::UnsupportedAlgorithm(header.alg));
    }
    let signature = Signature::from_slice(&BASE64_URL_SAFE.decode(signature)?)?;
    verifying_key.verify(signing_input.as_bytes(), &signature)?;
    Ok(BASE64_URL_SAFE.decode(payload)?)
}

pub fn parse_and_validate_jwt<T: DeserializeOwned + Serialize>(
    token: &str,
    verifying_key: &VerifyingKey,
) -> Result<JwtPayload<T>, JwtValidationError> {
    let payload: JwtPayload<T> =
        serde_json::from_slice(&verified_payload(token, verifying_key)?)?;
    if !payload.is_valid_now() {
        return Err(JwtValidationError::Expired);
    }
    Ok(payload)
}

pub fn generate_jwt<T: Serialize>(
    payload: &T,
    signing_key: &SigningKey,
) -> Result<String, JwtGenerationError> {
    let header = JwtHeader {
        alg: JWT_ALG.to_string(),
        typ: "JWT".to_string(),
    };
    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(payload)?);
    let signature: Signature = signing_key.try_sign(signing_input.as_bytes())?;
    Ok(format!(
        "{signing_input}.{}",
        BASE64_URL_SAFE.encode(signature.to_bytes())
    ))
}

/// argon2id, 64 MiB, 3 passes, 1 lane.
fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(64 * 1024, 3, 1, None).map_err(PasswordError::Params)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?
        .to_string())
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Loads the ed25519 key from `path`, generating and saving one on first start.
pub fn load_or_create_signing_key(path: &Path) -> Result<SigningKey, SigningKeyError> {
    if !path.exists() {
        let mut csprng = rand::rngs::OsRng;
        let signing_key: SigningKey = SigningKey::generate(&mut csprng);
        let keypair_json = serde_json::to_string_pretty(&signing_key)?;
        std::fs::write(path, keypair_json)?;
        tracing::info!("Generated new signing key and saved to {}", path.display());
    }
    let keypair_json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&keypair_json)?)
}
