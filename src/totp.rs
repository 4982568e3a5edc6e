//! Ephemeral VPN password generation
//!
//! The VPN expects `<static part><TOTP code>` as the password. Codes follow
//! RFC 6238 with the parameters every authenticator app defaults to:
//! HMAC-SHA1, 30 second step, 6 digits.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Seconds per TOTP time step
pub const STEP_SECS: u64 = 30;

/// Number of digits in a code
pub const DIGITS: u32 = 6;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid base32 TOTP secret: {0}")]
    InvalidSecret(String),
    #[error("System clock is before the Unix epoch")]
    Clock,
}

/// Decode a base32 secret as typed by users
///
/// Spaces, `=` padding and lowercase letters are accepted.
pub fn decode_secret(secret_base32: &str) -> Result<Vec<u8>, CredentialError> {
    let normalized: String = secret_base32
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(CredentialError::InvalidSecret("secret is empty".into()));
    }

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| CredentialError::InvalidSecret(e.to_string()))
}

/// RFC 4226 HOTP value for a counter, truncated to [`DIGITS`]
fn hotp(key: &[u8], counter: u64) -> Result<u32, CredentialError> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| CredentialError::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7fff_ffff;

    Ok(binary % 10u32.pow(DIGITS))
}

/// Zero-padded TOTP code for the step containing `unix_secs`
pub fn generate_code(secret_base32: &str, unix_secs: u64) -> Result<String, CredentialError> {
    let key = decode_secret(secret_base32)?;
    let code = hotp(&key, unix_secs / STEP_SECS)?;
    Ok(format!("{:0width$}", code, width = DIGITS as usize))
}

/// Build the password for a specific moment
pub fn combine_at(
    secret_base32: &str,
    password_static_part: &str,
    unix_secs: u64,
) -> Result<String, CredentialError> {
    let code = generate_code(secret_base32, unix_secs)?;
    Ok(format!("{}{}", password_static_part, code))
}

/// Build the password for the current time step
pub fn combine(secret_base32: &str, password_static_part: &str) -> Result<String, CredentialError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CredentialError::Clock)?
        .as_secs();
    combine_at(secret_base32, password_static_part, now)
}
