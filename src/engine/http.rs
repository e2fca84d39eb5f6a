// ABOUTME: Outbound HTTP for template executions and chain steps
// ABOUTME: Applies template headers verbatim, decodes utf-8 or gbk bodies, unwraps JSONP

use indexmap::IndexMap;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{ExecutionError, Result};
use crate::parser::{RequestMethod, ResponseEncoding};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_user_agent() -> String {
    format!("metricfeed/{}", env!("CARGO_PKG_VERSION"))
}

/// One fully resolved request.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: RequestMethod,
    pub url: &'a str,
    pub body: &'a str,
    pub headers: &'a IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
}

impl HttpRequester {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ExecutionError::ClientError)?;
        Ok(Self { client })
    }

    /// Send the request and return the raw body bytes. The status code is not
    /// inspected; error pages flow into extraction like any other body.
    pub async fn fetch(&self, request: HttpRequest<'_>) -> Result<Vec<u8>> {
        let method = match request.method {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, request.url);

        if request.method == RequestMethod::Post && !request.body.is_empty() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(request.body.to_string());
        }

        for (name, value) in request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => warn!("Skipping unrepresentable header '{}'", name),
            }
        }

        let http_err = |source| ExecutionError::HttpError {
            url: request.url.to_string(),
            source,
        };

        let response = builder.send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            debug!("{} {} answered {}", request.method.as_str(), request.url, status);
        }

        let bytes = response.bytes().await.map_err(http_err)?;
        Ok(bytes.to_vec())
    }
}

/// Decode body bytes with the declared encoding; invalid sequences become U+FFFD.
/// A leading byte order mark is stripped and takes precedence over the declaration.
pub fn decode_body(bytes: &[u8], encoding: ResponseEncoding) -> String {
    let declared = match encoding {
        ResponseEncoding::Utf8 => encoding_rs::UTF_8,
        ResponseEncoding::Gbk => encoding_rs::GBK,
    };
    let (text, _, _) = declared.decode(bytes);
    text.into_owned()
}

/// Strip one JSONP wrapper: either bare `( ... )` or `callback( ... );`.
/// Bodies that are not wrapped come back unchanged.
pub fn unwrap_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    let without_semicolon = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if let Some(inner) = without_semicolon
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return inner;
    }

    let Some(open) = without_semicolon.find('(') else {
        return trimmed;
    };
    let callback = &without_semicolon[..open];
    let is_callback = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');

    match without_semicolon[open + 1..].strip_suffix(')') {
        Some(inner) if is_callback => inner,
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_unwrap_jsonp() {
        assert_eq!(unwrap_jsonp(r#"({"a":1})"#), r#"{"a":1}"#);
        assert_eq!(unwrap_jsonp(" ({\"a\":1}) \n"), r#"{"a":1}"#);
        assert_eq!(unwrap_jsonp(r#"cb({"a":1});"#), r#"{"a":1}"#);
        assert_eq!(unwrap_jsonp(r#"jQuery_123.done([1,2])"#), "[1,2]");
        assert_eq!(unwrap_jsonp(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(unwrap_jsonp("var x = f(1)"), "var x = f(1)");
    }

    #[test]
    fn test_decode_gbk() {
        let (bytes, _, _) = encoding_rs::GBK.encode("北京 晴");
        assert_eq!(decode_body(&bytes, ResponseEncoding::Gbk), "北京 晴");
        assert_ne!(decode_body(&bytes, ResponseEncoding::Utf8), "北京 晴");
        assert_eq!(decode_body("ok".as_bytes(), ResponseEncoding::Utf8), "ok");
    }

    #[test]
    fn test_decode_strips_byte_order_mark() {
        let body = b"\xEF\xBB\xBF{\"data\":{\"temp\":21}}";
        assert_eq!(
            decode_body(body, ResponseEncoding::Utf8),
            r#"{"data":{"temp":21}}"#
        );
        assert_eq!(
            decode_body(body, ResponseEncoding::Gbk),
            r#"{"data":{"temp":21}}"#
        );
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("content-type", "application/json"))
            .and(header("x-api-key", "k1"))
            .and(body_string(r#"{"user":"u"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .expect(1)
            .mount(&server)
            .await;

        let requester = HttpRequester::new(DEFAULT_TIMEOUT, &default_user_agent()).unwrap();
        let headers = IndexMap::from([
            ("X-Api-Key".to_string(), "k1".to_string()),
            ("Bad Header".to_string(), "ignored".to_string()),
        ]);
        let url = format!("{}/login", server.uri());
        let body = requester
            .fetch(HttpRequest {
                method: RequestMethod::Post,
                url: &url,
                body: r#"{"user":"u"}"#,
                headers: &headers,
            })
            .await
            .unwrap();

        assert_eq!(body, b"done");
    }

    #[tokio::test]
    async fn test_non_ascii_header_value_is_sent_as_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let requester = HttpRequester::new(DEFAULT_TIMEOUT, &default_user_agent()).unwrap();
        let headers = IndexMap::from([("X-City".to_string(), "Zürich".to_string())]);
        let url = server.uri();
        requester
            .fetch(HttpRequest {
                method: RequestMethod::Get,
                url: &url,
                body: "",
                headers: &headers,
            })
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent = requests[0].headers.get("x-city").unwrap();
        assert_eq!(sent.as_bytes(), "Zürich".as_bytes());
    }

    #[tokio::test]
    async fn test_error_status_still_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"error":1}"#))
            .mount(&server)
            .await;

        let requester = HttpRequester::new(DEFAULT_TIMEOUT, &default_user_agent()).unwrap();
        let url = server.uri();
        let body = requester
            .fetch(HttpRequest {
                method: RequestMethod::Get,
                url: &url,
                body: "",
                headers: &IndexMap::new(),
            })
            .await
            .unwrap();

        assert_eq!(body, br#"{"error":1}"#);
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let requester = HttpRequester::new(DEFAULT_TIMEOUT, &default_user_agent()).unwrap();
        let result = requester
            .fetch(HttpRequest {
                method: RequestMethod::Get,
                url: "",
                body: "",
                headers: &IndexMap::new(),
            })
            .await;

        assert!(matches!(result, Err(ExecutionError::HttpError { .. })));
    }
}
