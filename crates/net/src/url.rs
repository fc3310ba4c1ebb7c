//! Pure, side-effect-free helpers for deriving filenames and host keys from
//! transfer URLs. Kept free of I/O so they can be unit-tested directly.

use sps2_errors::{Error, NetworkError};
use url::Url;

/// Parse and validate a transfer URL, rejecting schemes the single-transfer
/// driver cannot handle.
///
/// # Errors
///
/// Returns an error if the URL is malformed or uses an unsupported scheme.
pub fn parse_transfer_url(raw: &str) -> Result<Url, Error> {
    let parsed = Url::parse(raw).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(NetworkError::UnsupportedProtocol {
            protocol: scheme.to_string(),
        }
        .into()),
    }
}

/// Derive the remote filename from a URL's final path segment, URL-decoded.
///
/// Returns `None` if the URL has no path segments or the last segment is empty
/// (e.g. `https://mirror.example.com/`).
#[must_use]
pub fn remote_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    percent_decode(segment)
}

fn percent_decode(segment: &str) -> Option<String> {
    let decoded = percent_encoding::percent_decode_str(segment)
        .decode_utf8()
        .ok()?;
    Some(decoded.into_owned())
}

/// Extract a `filename` (or `filename*`) parameter from a `Content-Disposition`
/// header value. Returns `None` if the header is absent or carries no filename.
#[must_use]
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    for part in value.split(';').map(str::trim) {
        if let Some(rest) = part.strip_prefix("filename*=") {
            // RFC 5987 extended notation: charset'lang'value
            let value = rest.splitn(3, '\'').last().unwrap_or(rest);
            return percent_decode(value.trim_matches('"'));
        }
        if let Some(rest) = part.strip_prefix("filename=") {
            return Some(rest.trim_matches('"').to_string());
        }
    }
    None
}

/// A filename is safe to use as a destination basename only if it has no
/// path separators and does not escape the destination directory.
#[must_use]
pub fn is_safe_basename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Resolve the effective remote filename per the trust-remote-name policy:
/// when `trust_remote_name` is set and the server supplied a safe
/// `Content-Disposition` filename, prefer it; otherwise fall back to the
/// filename derived from the request URL.
#[must_use]
pub fn effective_remote_name(
    trust_remote_name: bool,
    content_disposition: Option<&str>,
    url_fallback: &str,
) -> String {
    if trust_remote_name {
        if let Some(name) = content_disposition
            .and_then(filename_from_content_disposition)
            .filter(|n| is_safe_basename(n))
        {
            return name;
        }
    }
    url_fallback.to_string()
}

/// Stable key identifying a transfer's host+scheme+port, used only for
/// diagnostics (log labels); never parsed back into a URL. `file://` URLs
/// carry no authority to report, so this yields the literal marker `disk`
/// rather than an empty or placeholder host.
#[must_use]
pub fn host_key(url: &Url) -> String {
    if url.scheme() == "file" {
        return "disk".to_string();
    }
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or("?"),
        url.port().map(|p| format!(":{p}")).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_name_strips_path() {
        let url = Url::parse("https://mirror.example.com/repo/pkg-1.2.3.tar.zst").unwrap();
        assert_eq!(
            remote_name_from_url(&url).as_deref(),
            Some("pkg-1.2.3.tar.zst")
        );
    }

    #[test]
    fn remote_name_none_for_trailing_slash() {
        let url = Url::parse("https://mirror.example.com/repo/").unwrap();
        assert_eq!(remote_name_from_url(&url), None);
    }

    #[test]
    fn content_disposition_basic() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="pkg.tar.zst""#).as_deref(),
            Some("pkg.tar.zst")
        );
    }

    #[test]
    fn content_disposition_extended() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=UTF-8''pkg%20v2.tar.zst")
                .as_deref(),
            Some("pkg v2.tar.zst")
        );
    }

    #[test]
    fn unsafe_basenames_rejected() {
        assert!(!is_safe_basename("../../etc/passwd"));
        assert!(!is_safe_basename(".."));
        assert!(is_safe_basename("pkg.tar.zst"));
    }

    #[test]
    fn effective_name_falls_back_when_untrusted() {
        let name = effective_remote_name(
            false,
            Some(r#"attachment; filename="evil.sh""#),
            "pkg.tar.zst",
        );
        assert_eq!(name, "pkg.tar.zst");
    }

    #[test]
    fn effective_name_rejects_unsafe_remote_filename() {
        let name = effective_remote_name(
            true,
            Some(r#"attachment; filename="../evil.sh""#),
            "pkg.tar.zst",
        );
        assert_eq!(name, "pkg.tar.zst");
    }

    #[test]
    fn unsupported_scheme_rejected() {
        assert!(parse_transfer_url("ftp://mirror.example.com/pkg").is_err());
    }

    #[test]
    fn host_key_reports_disk_for_file_urls() {
        let url = Url::parse("file:///var/cache/pkg.tar.zst").unwrap();
        assert_eq!(host_key(&url), "disk");
    }

    #[test]
    fn host_key_includes_scheme_host_and_port() {
        let url = Url::parse("https://mirror.example.com:8443/pkg.tar.zst").unwrap();
        assert_eq!(host_key(&url), "https://mirror.example.com:8443");
    }
}
