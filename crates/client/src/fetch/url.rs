//! Request URL resolution for fetches routed through the worker.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative URL {0} needs an origin")]
    MissingOrigin(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target the way a page would.
///
/// 1. Trim leading/trailing whitespace
/// 2. Paths starting with `/` resolve against `origin`
/// 3. Bare hosts default to `https://`
/// 4. Lowercase the host, drop the fragment, keep the query as is
pub fn resolve(input: &str, origin: Option<&Url>) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.starts_with('/') {
        let origin = origin.ok_or_else(|| UrlError::MissingOrigin(trimmed.to_string()))?;
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else if trimmed.contains("://") {
        Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        Url::parse(&format!("https://{trimmed}")).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn test_relative_path_uses_origin() {
        let url = resolve("/api/data?page=2", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/data?page=2");
    }

    #[test]
    fn test_relative_path_without_origin() {
        assert!(matches!(resolve("/api/data", None), Err(UrlError::MissingOrigin(_))));
    }

    #[test]
    fn test_absolute_url_ignores_origin() {
        let url = resolve("https://cdn.example.org/a.js", Some(&origin())).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.org"));
    }

    #[test]
    fn test_default_scheme_and_lowercase_host() {
        let url = resolve("  EXAMPLE.COM/x ", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/x");
    }

    #[test]
    fn test_fragment_removed() {
        let url = resolve("/page#top", Some(&origin())).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/page");
    }

    #[test]
    fn test_rejects_empty_and_other_schemes() {
        assert!(matches!(resolve("   ", None), Err(UrlError::Empty)));
        assert!(matches!(resolve("file:///etc/passwd", None), Err(UrlError::UnsupportedScheme(_))));
    }
}
