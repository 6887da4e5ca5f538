//! Precache list derived from the web app manifest.

use serde::Deserialize;
use url::Url;

use crate::http::{Fetcher, Request};
use crate::Error;

/// Application shell, always precached.
pub const BASE_PRECACHE: [&str; 3] = ["/", "/index.html", "/manifest.json"];

/// The part of a web app manifest that feeds the precache list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebManifest {
    #[serde(default)]
    pub icons: Option<Vec<ManifestIcon>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestIcon {
    #[serde(default)]
    pub src: Option<String>,
}

impl WebManifest {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| Error::Manifest(format!("invalid manifest: {e}")))
    }

    /// Base shell plus every icon with a `src`, as origin-relative
    /// `path?query` strings.
    pub fn precache_paths(&self, manifest_url: &Url) -> Result<Vec<String>, Error> {
        let mut paths: Vec<String> = BASE_PRECACHE.iter().map(|p| p.to_string()).collect();
        let sources = self.icons.iter().flatten().filter_map(|icon| icon.src.as_deref());
        for src in sources {
            let path = resolve_path(manifest_url, src)?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// `src` resolved against `base`, with the origin stripped.
fn resolve_path(base: &Url, src: &str) -> Result<String, Error> {
    let url = base
        .join(src)
        .map_err(|e| Error::Manifest(format!("invalid icon src {src}: {e}")))?;
    Ok(match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    })
}

/// Precache list used when the manifest cannot be fetched or parsed.
pub fn fallback_paths(fallback_asset: &str) -> Vec<String> {
    let mut paths: Vec<String> = BASE_PRECACHE.iter().map(|p| p.to_string()).collect();
    paths.push(fallback_asset.to_string());
    paths
}

async fn fetch_manifest(fetcher: &dyn Fetcher, manifest_url: &Url) -> Result<WebManifest, Error> {
    let request = Request::get(manifest_url.clone()).with_header("cache-control", "no-store");
    let response = fetcher
        .fetch(&request)
        .await
        .map_err(|e| Error::Manifest(e.to_string()))?;
    if !response.ok() {
        return Err(Error::Manifest(format!("status {} for {manifest_url}", response.status)));
    }
    WebManifest::parse(&response.body)
}

/// Precache list for install. Never fails; manifest problems fall back to
/// [`fallback_paths`].
pub async fn derive_precache(fetcher: &dyn Fetcher, manifest_url: &Url, fallback_asset: &str) -> Vec<String> {
    match fetch_manifest(fetcher, manifest_url)
        .await
        .and_then(|manifest| manifest.precache_paths(manifest_url))
    {
        Ok(paths) => paths,
        Err(err) => {
            tracing::warn!(url = %manifest_url, phase = "install", error = %err, "manifest unusable, using fallback precache list");
            fallback_paths(fallback_asset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::testing::{ScriptedFetcher, url};

    #[test]
    fn test_icons_resolved_to_paths() {
        let manifest = WebManifest::parse(
            br#"{"name":"x","icons":[{"src":"/icons/a.png"},{"src":"icons/b.png?v=2"},{"src":"https://cdn.example.org/c.png"}]}"#,
        )
        .unwrap();
        let paths = manifest.precache_paths(&url("/manifest.json")).unwrap();
        assert_eq!(paths, vec!["/", "/index.html", "/manifest.json", "/icons/a.png", "/icons/b.png?v=2", "/c.png"]);
    }

    #[test]
    fn test_manifest_without_icons() {
        let manifest = WebManifest::parse(br#"{"name":"x"}"#).unwrap();
        assert_eq!(manifest.precache_paths(&url("/manifest.json")).unwrap().len(), BASE_PRECACHE.len());
    }

    #[test]
    fn test_icons_without_src_are_skipped() {
        let manifest =
            WebManifest::parse(br#"{"icons":[{"sizes":"192x192"},{"src":"/icons/a.png"},{"src":null}]}"#).unwrap();
        let paths = manifest.precache_paths(&url("/manifest.json")).unwrap();
        assert_eq!(paths.last().map(String::as_str), Some("/icons/a.png"));
        assert_eq!(paths.len(), BASE_PRECACHE.len() + 1);

        let manifest = WebManifest::parse(br#"{"icons":null}"#).unwrap();
        assert_eq!(manifest.precache_paths(&url("/manifest.json")).unwrap().len(), BASE_PRECACHE.len());
    }

    #[tokio::test]
    async fn test_derive_sends_no_store() {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(&url("/manifest.json"), Response::new(200, r#"{"icons":[{"src":"/i.png"}]}"#));

        let paths = derive_precache(&fetcher, &url("/manifest.json"), "/fallback.png").await;
        assert!(paths.contains(&"/i.png".to_string()));

        let sent = fetcher.last_request(&url("/manifest.json")).unwrap();
        assert_eq!(sent.headers.get("cache-control").map(String::as_str), Some("no-store"));
    }

    #[tokio::test]
    async fn test_fallback_on_fetch_failure() {
        let fetcher = ScriptedFetcher::new();
        fetcher.fail(&url("/manifest.json"), "offline");

        let paths = derive_precache(&fetcher, &url("/manifest.json"), "/fallback.png").await;
        assert_eq!(paths, fallback_paths("/fallback.png"));
    }

    #[tokio::test]
    async fn test_fallback_on_bad_json_or_status() {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(&url("/manifest.json"), Response::new(200, "<html>"));
        let paths = derive_precache(&fetcher, &url("/manifest.json"), "/fallback.png").await;
        assert_eq!(paths.last().map(String::as_str), Some("/fallback.png"));

        let fetcher = ScriptedFetcher::new();
        fetcher.respond(&url("/manifest.json"), Response::new(404, "{}"));
        let paths = derive_precache(&fetcher, &url("/manifest.json"), "/fallback.png").await;
        assert_eq!(paths.last().map(String::as_str), Some("/fallback.png"));
    }
}
