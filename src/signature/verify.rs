//! HMAC-SHA256 signature computation and comparison

use std::fmt;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{
    build_content, signature_from_headers, CanonicalContent, HeaderLookup, SignatureResult,
    SIGNATURE_PREFIX,
};

/// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Shared webhook signing secret.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<&str> for Secret {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Secret {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

/// Outcome of comparing a claimed signature with the computed one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Signature computed from the content, `sha256=<lowercase hex>`
    pub computed_signature: String,
    /// Whether the claimed signature equals the computed one
    pub matched: bool,
}

/// Compute the signature of `content` in OpsLevel's header format:
/// `sha256=<hex-encoded-hmac>`.
pub fn compute_signature(content: &[u8], secret: &Secret) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.expose()).expect("HMAC can take any key size");
    mac.update(content);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Recompute the signature of `content` and compare it with `claimed`.
///
/// The comparison is exact (a claimed digest in uppercase hex does not
/// match) and runs in constant time with respect to the claimed value.
pub fn verify(content: impl AsRef<[u8]>, claimed: &str, secret: &Secret) -> Verification {
    let computed_signature = compute_signature(content.as_ref(), secret);
    let matched = computed_signature
        .as_bytes()
        .ct_eq(claimed.as_bytes())
        .into();

    Verification {
        computed_signature,
        matched,
    }
}

/// Verifies OpsLevel webhook deliveries against one shared secret
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    /// Secret key for HMAC signature verification
    secret: Secret,
    /// Extra header names the sender includes in the signed content
    additional_headers: Vec<String>,
}

impl SignatureVerifier {
    /// Create a verifier for the given secret with no extra headers
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            additional_headers: Vec::new(),
        }
    }

    /// Set the extra header names included in the signed content
    pub fn with_additional_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn additional_headers(&self) -> &[String] {
        &self.additional_headers
    }

    /// Build the canonical content of a delivery with this verifier's
    /// extra headers
    pub fn content<H: HeaderLookup + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
    ) -> SignatureResult<CanonicalContent> {
        build_content(headers, &self.additional_headers, body)
    }

    /// Compare a claimed signature against already-built content
    pub fn verify_content(&self, content: &CanonicalContent, claimed: &str) -> Verification {
        verify(content, claimed, &self.secret)
    }

    /// Verify a whole delivery: extract the claimed signature, rebuild the
    /// content and compare.
    ///
    /// A mismatch is reported through [`Verification::matched`]; errors are
    /// reserved for deliveries missing a required header.
    pub fn verify_request<H: HeaderLookup + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
    ) -> SignatureResult<Verification> {
        let claimed = signature_from_headers(headers)?;
        let content = self.content(headers, body)?;
        Ok(self.verify_content(&content, &claimed))
    }

    /// Compute the signature a sender would attach to this delivery.
    ///
    /// This is useful for testing and debugging receivers.
    pub fn sign<H: HeaderLookup + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
    ) -> SignatureResult<String> {
        let content = self.content(headers, body)?;
        Ok(compute_signature(content.as_bytes(), &self.secret))
    }
}
