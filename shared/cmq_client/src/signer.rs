use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    error::{CmqError, CmqResult},
    params::RequestParams,
};

type HmacSha256 = Hmac<Sha256>;

/// Value of the `SignatureMethod` parameter matching [`sign`]
pub const SIGNATURE_METHOD: &str = "HmacSHA256";

const SUPPORTED_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Builds the string the service signs: `method + host_and_path + "?" +
/// sorted unescaped params`
#[must_use]
pub fn canonical_request(method: &str, host_and_path: &str, params: &RequestParams) -> String {
    format!("{method}{host_and_path}?{}", params.canonical_string())
}

/// Signs a request and returns the standard Base64 encoded HMAC-SHA256
///
/// # Errors
///
/// Returns [`CmqError::InvalidKey`] if the MAC rejects the secret key
pub fn sign(
    method: &str,
    host_and_path: &str,
    secret_key: &str,
    params: &RequestParams,
) -> CmqResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())?;
    mac.update(canonical_request(method, host_and_path, params).as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Strips the `http://` or `https://` prefix from a base URL
///
/// # Errors
///
/// Returns [`CmqError::InvalidUrl`] for any other scheme, or when nothing
/// follows the scheme.
pub fn strip_scheme(url: &str) -> CmqResult<&str> {
    SUPPORTED_SCHEMES
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| CmqError::InvalidUrl(url.to_string()))
}
