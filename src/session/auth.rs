//! Shared Access Signature tokens and the registration query.
//!
//! A SAS token authorizes the registration request. It is built from the
//! resource URI and the device key:
//!
//! ```text
//! SharedAccessSignature sr=<enc(uri)>&sig=<enc(base64(hmac))>&se=<expiry>
//! hmac = HMAC-SHA256(base64_decode(key), enc(uri) + "\n" + expiry)
//! ```
//!
//! where `enc` is percent-encoding and `expiry` is seconds since the Unix
//! epoch. Tokens are valid for one hour by default.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{DmError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Produces access tokens for the registration query.
pub trait TokenSigner: Send + Sync {
    /// Build a token for `resource_uri` signed with `device_key`.
    fn create_token(&self, resource_uri: &str, device_key: &str) -> Result<String>;
}

/// HMAC-SHA256 SAS token signer.
#[derive(Debug, Clone, Copy)]
pub struct SasTokenSigner {
    lifetime: Duration,
}

impl SasTokenSigner {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }
}

impl Default for SasTokenSigner {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIFETIME)
    }
}

impl TokenSigner for SasTokenSigner {
    fn create_token(&self, resource_uri: &str, device_key: &str) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DmError::Auth(format!("system clock before epoch: {}", e)))?;
        let expiry = (now + self.lifetime).as_secs();
        create_sas_token_at(resource_uri, device_key, expiry)
    }
}

/// Create a SAS token expiring one hour from now.
pub fn create_sas_token(resource_uri: &str, device_key: &str) -> Result<String> {
    SasTokenSigner::default().create_token(resource_uri, device_key)
}

/// Create a SAS token with an explicit expiry (seconds since the epoch).
pub fn create_sas_token_at(resource_uri: &str, device_key: &str, expiry: u64) -> Result<String> {
    if resource_uri.is_empty() {
        return Err(DmError::Auth("resource URI is empty".to_string()));
    }
    if device_key.is_empty() {
        return Err(DmError::Auth("device key is empty".to_string()));
    }

    let key = BASE64
        .decode(device_key)
        .map_err(|e| DmError::Auth(format!("device key is not valid base64: {}", e)))?;

    let encoded_uri = url_encode(resource_uri);
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| DmError::Auth(format!("invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}",
        encoded_uri,
        url_encode(&signature),
        expiry
    ))
}

/// Build `?ep=<endpoint>&b=T&tk=<token>` for the registration request.
///
/// The token is percent-encoded. No partial query is returned on failure.
pub fn build_registration_query(
    endpoint_name: &str,
    resource_uri: &str,
    device_key: &str,
    signer: &dyn TokenSigner,
) -> Result<String> {
    if endpoint_name.is_empty() {
        return Err(DmError::InvalidArgument(
            "endpoint name is empty".to_string(),
        ));
    }

    let token = signer.create_token(resource_uri, device_key)?;
    Ok(format!(
        "?ep={}&b=T&tk={}",
        endpoint_name,
        url_encode(&token)
    ))
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn url_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push('%');
                result.push_str(&format!("{:02X}", byte));
            }
        }
    }
    result
}
