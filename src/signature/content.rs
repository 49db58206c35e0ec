//! Canonical content construction
//!
//! The signed content of a delivery is
//!
//! ```text
//! <name>:<value>,<name>:<value>,...+<body>
//! ```
//!
//! where the names are `X-OpsLevel-Timing`, `X-OpsLevel-Action-Id` when the
//! request carries it, and any extra names the receiver was configured with.
//! Names are sorted byte-wise in the casing they were supplied in and
//! rendered in that same casing; only the value lookup ignores case. Senders
//! compute exactly this, so neither the sort nor the rendering may normalize.

use std::borrow::Cow;
use std::fmt;

use super::{
    HeaderLookup, SignatureError, SignatureResult, HEADER_ACTION_ID, HEADER_TIMING,
};

/// The exact byte string a delivery's signature is computed over.
///
/// Kept as bytes because the body is copied in verbatim and need not be
/// UTF-8. `Display` renders it lossily for logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalContent(Vec<u8>);

impl CanonicalContent {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The content as text, if the body was valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalContent {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CanonicalContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl PartialEq<str> for CanonicalContent {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for CanonicalContent {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// Build the content that was signed for a delivery.
///
/// `additional_headers` are included in the order given and are not
/// deduplicated. A listed header the request does not carry is rendered with
/// an empty value.
///
/// # Errors
/// [`SignatureError::MissingHeader`] naming `X-OpsLevel-Timing` when that
/// header is absent or empty. No content is produced in that case.
///
/// # Examples
///
/// ```
/// use opslevel_webhook_verifier::signature::{build_content, HeaderSet};
///
/// let headers = HeaderSet::new()
///     .with("X-Opslevel-Timing", "1726164245")
///     .with("Content-Type", "application/json");
/// let content = build_content(&headers, &["Content-Type"], b"{}")?;
///
/// assert_eq!(content, "Content-Type:application/json,X-OpsLevel-Timing:1726164245+{}");
/// # Ok::<(), opslevel_webhook_verifier::signature::SignatureError>(())
/// ```
pub fn build_content<H, S>(
    headers: &H,
    additional_headers: &[S],
    body: &[u8],
) -> SignatureResult<CanonicalContent>
where
    H: HeaderLookup + ?Sized,
    S: AsRef<str>,
{
    if headers.lookup_non_empty(HEADER_TIMING).is_none() {
        return Err(SignatureError::MissingHeader(HEADER_TIMING.to_string()));
    }

    let mut names: Vec<&str> = Vec::with_capacity(additional_headers.len() + 2);
    names.push(HEADER_TIMING);
    if headers.lookup_non_empty(HEADER_ACTION_ID).is_some() {
        names.push(HEADER_ACTION_ID);
    }
    names.extend(additional_headers.iter().map(AsRef::as_ref));

    // `str` ordering is byte-wise, so uppercase sorts before lowercase.
    names.sort_unstable();

    let mut content = Vec::with_capacity(body.len() + names.len() * 32);
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            content.push(b',');
        }
        content.extend_from_slice(name.as_bytes());
        content.push(b':');
        content.extend_from_slice(headers.lookup(name).unwrap_or_default().as_bytes());
    }
    content.push(b'+');
    content.extend_from_slice(body);

    Ok(CanonicalContent(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::HeaderSet;

    const SIGNATURE: &str =
        "sha256=ab238ca1f60b94dbf50e7b237baf0dc93f02e4ff21736d549f9625d5300f962b";

    fn delivery_headers() -> HeaderSet {
        HeaderSet::new()
            .with("X-Opslevel-Timing", "1726164245")
            .with("X-Opslevel-Signature", SIGNATURE)
    }

    const NO_EXTRA: &[&str] = &[];

    #[test]
    fn test_timing_only() {
        let content = build_content(&delivery_headers(), NO_EXTRA, b"").unwrap();
        assert_eq!(content, "X-OpsLevel-Timing:1726164245+");
    }

    #[test]
    fn test_body_appended_verbatim() {
        let body = b"{\n  \"service\": \"shopping-cart-service\"\n}";
        let content = build_content(&delivery_headers(), NO_EXTRA, body).unwrap();

        assert_eq!(
            content,
            "X-OpsLevel-Timing:1726164245+{\n  \"service\": \"shopping-cart-service\"\n}"
        );
    }

    #[test]
    fn test_additional_header_sorted_before_timing() {
        let headers = delivery_headers().with("Anotherheader-Signature", "somevalue");
        let content = build_content(&headers, &["Anotherheader-Signature"], b"").unwrap();

        assert_eq!(
            content,
            "Anotherheader-Signature:somevalue,X-OpsLevel-Timing:1726164245+"
        );
    }

    #[test]
    fn test_lowercase_additional_header_sorts_after_timing() {
        let headers = delivery_headers().with("Anotherheader-Signature", "somevalue");
        let content = build_content(&headers, &["anotherheader-Signature"], b"").unwrap();

        assert_eq!(
            content,
            "X-OpsLevel-Timing:1726164245,anotherheader-Signature:somevalue+"
        );
    }

    #[test]
    fn test_unlisted_headers_ignored() {
        let headers = delivery_headers().with("Anotherheader-Signature", "somevalue");
        let content = build_content(&headers, NO_EXTRA, b"").unwrap();
        assert_eq!(content, "X-OpsLevel-Timing:1726164245+");
    }

    #[test]
    fn test_missing_timing_header() {
        let headers = HeaderSet::new().with("X-Opslevel-Signature", SIGNATURE);
        let err = build_content(&headers, NO_EXTRA, b"").unwrap_err();

        assert_eq!(
            err,
            SignatureError::MissingHeader("X-OpsLevel-Timing".to_string())
        );
    }

    #[test]
    fn test_empty_timing_header() {
        let headers = HeaderSet::new().with("X-OpsLevel-Timing", "");
        assert!(build_content(&headers, &["Accept"], b"body").is_err());
    }

    #[test]
    fn test_action_id_included_when_present() {
        let headers = delivery_headers().with("x-opslevel-action-id", "act-42");
        let content = build_content(&headers, NO_EXTRA, b"{}").unwrap();

        assert_eq!(
            content,
            "X-OpsLevel-Action-Id:act-42,X-OpsLevel-Timing:1726164245+{}"
        );
    }

    #[test]
    fn test_empty_action_id_skipped() {
        let headers = delivery_headers().with("X-OpsLevel-Action-Id", "");
        let content = build_content(&headers, NO_EXTRA, b"").unwrap();
        assert_eq!(content, "X-OpsLevel-Timing:1726164245+");
    }

    #[test]
    fn test_missing_additional_header_renders_empty_value() {
        let content = build_content(&delivery_headers(), &["Authorization"], b"").unwrap();
        assert_eq!(content, "Authorization:,X-OpsLevel-Timing:1726164245+");
    }

    #[test]
    fn test_duplicate_additional_headers_kept() {
        let headers = delivery_headers().with("Accept", "*/*");
        let content = build_content(&headers, &["Accept", "Accept"], b"").unwrap();
        assert_eq!(content, "Accept:*/*,Accept:*/*,X-OpsLevel-Timing:1726164245+");
    }

    #[test]
    fn test_several_additional_headers() {
        let headers = delivery_headers()
            .with("Content-Type", "application/json")
            .with("From", "opslevel")
            .with("Accept", "application/json");
        let extras = vec![
            "From".to_string(),
            "Content-Type".to_string(),
            "Accept".to_string(),
        ];
        let content = build_content(&headers, &extras, b"x").unwrap();

        assert_eq!(
            content,
            "Accept:application/json,Content-Type:application/json,From:opslevel,X-OpsLevel-Timing:1726164245+x"
        );
    }

    #[test]
    fn test_non_utf8_body_kept_byte_for_byte() {
        let body = [0xff, 0x00, 0xfe];
        let content = build_content(&delivery_headers(), NO_EXTRA, &body).unwrap();

        let mut expected = b"X-OpsLevel-Timing:1726164245+".to_vec();
        expected.extend_from_slice(&body);
        assert_eq!(content.as_bytes(), expected.as_slice());
        assert!(content.as_str().is_none());
        assert!(content.to_string().starts_with("X-OpsLevel-Timing:1726164245+"));
    }

    #[test]
    fn test_deterministic() {
        let headers = delivery_headers().with("From", "opslevel");
        let first = build_content(&headers, &["From"], b"payload").unwrap();
        let second = build_content(&headers, &["From"], b"payload").unwrap();
        assert_eq!(first, second);
    }
}
