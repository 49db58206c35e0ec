//! OpsLevel webhook signature verification
//!
//! OpsLevel signs every webhook delivery with HMAC-SHA256 over a canonical
//! string built from a handful of request headers and the raw body. This
//! module rebuilds that string and checks the signature carried in the
//! `X-OpsLevel-Signature` header.
//!
//! The pipeline for one request is:
//!
//! 1. [`signature_from_headers`] pulls the claimed signature out of the headers.
//! 2. [`build_content`] rebuilds the signed content.
//! 3. [`verify`] recomputes the signature with the shared [`Secret`].
//!
//! [`SignatureVerifier`] bundles the three steps for callers that hold a
//! secret and a fixed list of extra headers.

pub mod content;
pub mod extract;
pub mod headers;
pub mod verify;

pub use content::{build_content, CanonicalContent};
pub use extract::signature_from_headers;
pub use headers::{HeaderLookup, HeaderSet};
pub use verify::{compute_signature, verify, Secret, SignatureVerifier, Verification};

use thiserror::Error;

/// Header carrying the `sha256=<hex>` signature of the delivery.
pub const HEADER_SIGNATURE: &str = "X-OpsLevel-Signature";

/// Header carrying the freshness token, part of every signed payload.
pub const HEADER_TIMING: &str = "X-OpsLevel-Timing";

/// Header correlating follow-up requests with the action that triggered them.
/// Signed only when present.
pub const HEADER_ACTION_ID: &str = "X-OpsLevel-Action-Id";

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors raised while reading a delivery's signed parts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// A required header was absent or empty
    #[error("missing header '{0}'")]
    MissingHeader(String),
}

/// Result type for signature operations
pub type SignatureResult<T> = Result<T, SignatureError>;
