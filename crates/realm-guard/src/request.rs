//! Raw token extraction from incoming requests.
//!
//! The bearer header is preferred. When no `Authorization: Bearer` header
//! carries a credential, the configured input field is read instead. By
//! default input fields come from the query string; embedding layers that
//! parse form or JSON bodies override [`TokenSource::input`].

use http::header::AUTHORIZATION;
use http::{HeaderMap, Uri};
use secrecy::SecretString;

const BEARER_SCHEME: &str = "bearer";

/// A request the guard can read a token from.
pub trait TokenSource {
    fn headers(&self) -> &HeaderMap;

    fn uri(&self) -> &Uri;

    /// The value of input field `key`.
    fn input(&self, key: &str) -> Option<String> {
        query_value(self.uri(), key)
    }
}

impl<B> TokenSource for http::Request<B> {
    fn headers(&self) -> &HeaderMap {
        http::Request::headers(self)
    }

    fn uri(&self) -> &Uri {
        http::Request::uri(self)
    }
}

impl TokenSource for http::request::Parts {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }
}

/// Extract the raw token from `source`.
///
/// Returns an empty secret when neither the bearer header nor the input
/// field carries a token.
pub fn extract_token<T: TokenSource + ?Sized>(source: &T, input_key: Option<&str>) -> SecretString {
    if let Some(token) = bearer_token(source.headers()) {
        return SecretString::from(token.to_string());
    }

    let from_input = input_key.and_then(|key| source.input(key));
    if from_input.is_some() {
        tracing::debug!(target: "guard.auth", "Token read from input field");
    }

    SecretString::from(from_input.unwrap_or_default())
}

/// The credential of an `Authorization: Bearer` header, trimmed and cut at
/// the first `,`. `None` when the header is absent, uses another scheme or
/// carries no credential.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();

    let (scheme, credential) = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) => (scheme, rest),
        None => (value, ""),
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }

    let credential = credential
        .split_once(',')
        .map_or(credential, |(token, _)| token)
        .trim();
    (!credential.is_empty()).then_some(credential)
}

fn query_value(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn request(uri: &str, authorization: Option<&str>) -> http::Request<()> {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    fn extract(req: &http::Request<()>, input_key: Option<&str>) -> String {
        extract_token(req, input_key).expose_secret().to_string()
    }

    #[test]
    fn test_bearer_header() {
        let req = request("/api/me", Some("Bearer abc.def.ghi"));
        assert_eq!(extract(&req, None), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        let req = request("/api/me", Some("bearer abc.def.ghi"));
        assert_eq!(extract(&req, None), "abc.def.ghi");

        let req = request("/api/me", Some("BEARER   abc.def.ghi  "));
        assert_eq!(extract(&req, None), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_cut_at_comma() {
        let req = request("/api/me", Some("Bearer abc.def.ghi, Basic Zm9vOmJhcg=="));
        assert_eq!(extract(&req, None), "abc.def.ghi");
    }

    #[test]
    fn test_other_scheme_ignored() {
        let req = request("/api/me", Some("Basic Zm9vOmJhcg=="));
        assert_eq!(extract(&req, None), "");
    }

    #[test]
    fn test_input_field_fallback() {
        let req = request("/api/me?api_token=abc.def.ghi&x=1", None);
        assert_eq!(extract(&req, Some("api_token")), "abc.def.ghi");
    }

    #[test]
    fn test_input_field_is_url_decoded() {
        let req = request("/api/me?api_token=abc%2Edef.ghi", None);
        assert_eq!(extract(&req, Some("api_token")), "abc.def.ghi");
    }

    #[test]
    fn test_input_field_ignored_without_input_key() {
        let req = request("/api/me?api_token=abc.def.ghi", None);
        assert_eq!(extract(&req, None), "");
    }

    #[test]
    fn test_header_wins_over_input_field() {
        let req = request("/api/me?api_token=from-query", Some("Bearer from-header"));
        assert_eq!(extract(&req, Some("api_token")), "from-header");
    }

    #[test]
    fn test_empty_bearer_header_falls_back_to_input_field() {
        let req = request("/api/me?api_token=from-query", Some("Bearer"));
        assert_eq!(extract(&req, Some("api_token")), "from-query");

        let req = request("/api/me?api_token=from-query", Some("Bearer  , Basic x"));
        assert_eq!(extract(&req, Some("api_token")), "from-query");

        let req = request("/api/me", Some("Bearer"));
        assert_eq!(extract(&req, Some("api_token")), "");
    }

    /// Source whose input fields come from a parsed request body.
    struct FormRequest {
        parts: http::request::Parts,
        body: Vec<(String, String)>,
    }

    impl TokenSource for FormRequest {
        fn headers(&self) -> &HeaderMap {
            &self.parts.headers
        }

        fn uri(&self) -> &Uri {
            &self.parts.uri
        }

        fn input(&self, key: &str) -> Option<String> {
            self.body
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .or_else(|| query_value(&self.parts.uri, key))
        }
    }

    #[test]
    fn test_input_field_from_overridden_source() {
        let (parts, ()) = request("/api/me", None).into_parts();
        let source = FormRequest {
            parts,
            body: vec![("api_token".to_string(), "from-body".to_string())],
        };

        assert_eq!(
            extract_token(&source, Some("api_token")).expose_secret(),
            "from-body"
        );
    }

    #[test]
    fn test_non_bearer_header_falls_back_to_input_field() {
        let req = request("/api/me?api_token=from-query", Some("Basic Zm9vOmJhcg=="));
        assert_eq!(extract(&req, Some("api_token")), "from-query");
    }

    #[test]
    fn test_no_token_anywhere() {
        let req = request("/api/me", None);
        assert_eq!(extract(&req, Some("api_token")), "");
    }

    #[test]
    fn test_request_parts_source() {
        let (parts, ()) = request("/api/me", Some("Bearer abc.def.ghi")).into_parts();
        assert_eq!(extract_token(&parts, None).expose_secret(), "abc.def.ghi");
    }
}
