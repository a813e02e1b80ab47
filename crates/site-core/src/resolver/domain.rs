//! Domain normalization and validation

use url::{Host, Url};

use crate::{Error, Result};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Strip a leading `http://` or `https://` and surrounding whitespace
pub fn strip_scheme(domain: &str) -> &str {
    let trimmed = domain.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else {
        trimmed
    }
}

/// Normalize and validate a user-supplied domain
///
/// Accepts a bare host name optionally prefixed with a scheme and followed by
/// a single `/`. The result is the lowercase host name with no scheme. Paths,
/// queries, fragments, ports, credentials and IP addresses are rejected. The
/// name must sit at or below a registrable domain of a listed public suffix,
/// so a bare suffix such as `co.uk` is refused.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let invalid = |reason: &str| Error::InvalidDomain {
        domain: raw.to_string(),
        reason: reason.to_string(),
    };

    let bare = strip_scheme(raw);
    if bare.is_empty() {
        return Err(invalid("domain is empty"));
    }

    let url = Url::parse(&format!("http://{}", bare))
        .map_err(|e| invalid(&format!("invalid domain format ({})", e)))?;

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(
            "domain must not contain paths, query strings, or fragments",
        ));
    }
    if url.port().is_some() || !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("domain must not contain a port or credentials"));
    }

    let host = match url.host() {
        Some(Host::Domain(host)) => host.trim_end_matches('.').to_string(),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
            return Err(invalid("IP addresses are not domains"));
        }
        None => return Err(invalid("invalid domain format")),
    };

    validate_labels(&host).map_err(|reason| invalid(reason))?;
    Ok(host)
}

fn validate_labels(host: &str) -> std::result::Result<(), &'static str> {
    if host.len() > MAX_DOMAIN_LEN {
        return Err("domain is too long");
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err("domain must have a registrable name and a top-level domain");
    }

    for label in &labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err("domain labels must be between 1 and 63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("domain labels must not start or end with a hyphen");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err("domain labels may only contain letters, digits and hyphens");
        }
    }

    let registrable = psl::domain(host.as_bytes())
        .ok_or("domain is a public suffix, not a registrable name")?;
    if !registrable.suffix().is_known() {
        return Err("top-level domain is not a listed public suffix");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_schemed_domains() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("https://example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("http://Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_domain("sub.example.com").unwrap(), "sub.example.com");
        assert_eq!(normalize_domain("https://example.com/").unwrap(), "example.com");
        assert_eq!(normalize_domain("shop.example.co.uk").unwrap(), "shop.example.co.uk");
    }

    #[test]
    fn test_rejects_paths_and_garbage() {
        for bad in [
            "https://example.com/path",
            "example.com//",
            "co.uk",
            "com",
            "example.invalidtld",
            "example.com?x=1",
            "example.com#top",
            "not a domain",
            "localhost",
            "example.com:8080",
            "127.0.0.1",
            "-bad.example.com",
            "example.123",
            "",
        ] {
            let err = normalize_domain(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDomain { .. }),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme(" https://a.io "), "a.io");
        assert_eq!(strip_scheme("a.io"), "a.io");
    }
}
