//! Request origin and redirect target handling.

use axum::http::HeaderMap;
use reqwest::Url;

/// Works out the public origin of a request.
///
/// With `trust_host`, `X-Forwarded-Host` and `X-Forwarded-Proto` from a
/// reverse proxy override the configured base URL.
#[must_use]
pub fn request_origin(configured: &Url, headers: &HeaderMap, trust_host: bool) -> Url {
    if !trust_host {
        return configured.clone();
    }
    let Some(host) = forwarded(headers, "x-forwarded-host") else {
        return configured.clone();
    };
    let proto = forwarded(headers, "x-forwarded-proto").unwrap_or(configured.scheme());
    Url::parse(&format!("{proto}://{host}")).unwrap_or_else(|_| configured.clone())
}

/// First value of a proxy header, trimmed.
fn forwarded<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Restricts a requested callback URL to this origin.
///
/// Relative paths are resolved against `origin`; absolute URLs are kept only
/// when they share its origin. Everything else falls back to the origin.
#[must_use]
pub fn safe_callback_url(candidate: Option<&str>, origin: &Url) -> String {
    let fallback = || origin.origin().ascii_serialization();
    let Some(candidate) = candidate.map(str::trim).filter(|c| !c.is_empty()) else {
        return fallback();
    };

    if candidate.starts_with('/') {
        if candidate.starts_with("//") || candidate.starts_with("/\\") {
            return fallback();
        }
        return origin
            .join(candidate)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| fallback());
    }

    match Url::parse(candidate) {
        Ok(url) if url.origin() == origin.origin() => url.to_string(),
        _ => fallback(),
    }
}

/// Builds an absolute URL for a configured page with query parameters.
#[must_use]
pub fn page_url(origin: &Url, path: &str, params: &[(&str, &str)]) -> String {
    let Ok(mut url) = origin.join(path) else {
        return origin.origin().ascii_serialization();
    };
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn base() -> Url {
        Url::parse("http://localhost:3000").expect("url")
    }

    #[test]
    fn relative_callback_resolves_against_origin() {
        assert_eq!(
            safe_callback_url(Some("/courses/42?tab=roster"), &base()),
            "http://localhost:3000/courses/42?tab=roster"
        );
    }

    #[test]
    fn same_origin_absolute_callback_is_kept() {
        assert_eq!(
            safe_callback_url(Some("http://localhost:3000/dashboard"), &base()),
            "http://localhost:3000/dashboard"
        );
    }

    #[test]
    fn foreign_callback_falls_back_to_origin() {
        for candidate in [
            "https://evil.example.com/steal",
            "//evil.example.com/steal",
            "/\\evil.example.com",
            "http://localhost:4000/",
            "javascript:alert(1)",
        ] {
            assert_eq!(
                safe_callback_url(Some(candidate), &base()),
                "http://localhost:3000",
                "candidate {candidate}"
            );
        }
    }

    #[test]
    fn missing_callback_is_origin() {
        assert_eq!(safe_callback_url(None, &base()), "http://localhost:3000");
        assert_eq!(safe_callback_url(Some(" "), &base()), "http://localhost:3000");
    }

    #[test]
    fn forwarded_headers_override_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("courses.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        let origin = request_origin(&base(), &headers, true);
        assert_eq!(origin.origin().ascii_serialization(), "https://courses.example.com");

        let untrusted = request_origin(&base(), &headers, false);
        assert_eq!(untrusted, base());
    }

    #[test]
    fn forwarded_host_without_proto_keeps_configured_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("proxy.local:8080"));

        let origin = request_origin(&base(), &headers, true);
        assert_eq!(origin.as_str(), "http://proxy.local:8080/");
    }

    #[test]
    fn page_url_encodes_params() {
        assert_eq!(
            page_url(&base(), "/auth/signin", &[("callbackUrl", "/courses?x=1")]),
            "http://localhost:3000/auth/signin?callbackUrl=%2Fcourses%3Fx%3D1"
        );
        assert_eq!(
            page_url(&base(), "/auth/error", &[("error", "Configuration")]),
            "http://localhost:3000/auth/error?error=Configuration"
        );
        assert_eq!(page_url(&base(), "/auth/signin", &[]), "http://localhost:3000/auth/signin");
    }
}
