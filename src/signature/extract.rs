//! Signature header extraction

use super::{HeaderLookup, SignatureError, SignatureResult, HEADER_SIGNATURE};

/// Return the claimed signature carried in `X-OpsLevel-Signature`.
///
/// The value is returned as-is; the `sha256=<hex>` format is only checked
/// implicitly when it is compared against the computed signature.
///
/// # Errors
/// [`SignatureError::MissingHeader`] when the header is absent or empty.
pub fn signature_from_headers<H: HeaderLookup + ?Sized>(headers: &H) -> SignatureResult<String> {
    headers
        .lookup_non_empty(HEADER_SIGNATURE)
        .map(str::to_string)
        .ok_or_else(|| SignatureError::MissingHeader(HEADER_SIGNATURE.to_string()))
}
