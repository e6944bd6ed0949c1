//! Blocking HTTP transport port.
//!
//! Remote clients in this crate talk to a narrow `HttpSender` trait instead
//! of reqwest directly, so tests can substitute a scripted transport. The
//! default implementation wraps a blocking reqwest client with a cookie jar
//! and a bounded request duration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Upper bound on any single request, including body transfer.
pub const DEFAULT_MAX_REQUEST_DURATION: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub max_request_duration: Option<Duration>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Full Authorization header value, e.g. `"Bearer xyz"`. Takes
    /// precedence over username/password when set.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Multipart upload request: one file part plus plain form fields.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub method: String,
    pub url: String,
    pub file: PathBuf,
    pub file_field_name: String,
    pub form_fields: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
}

/// Transport abstraction used by every remote client in this crate.
///
/// `send` and `upload` return `Ok` only for status codes below 300; a 3xx/
/// 4xx/5xx response surfaces as `Error::Http` carrying status and body.
pub trait HttpSender {
    fn set_options(&mut self, options: ClientOptions);

    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        headers: &[(String, String)],
    ) -> Result<HttpResponse>;

    fn upload(&self, request: &UploadRequest) -> Result<HttpResponse>;
}

/// Blocking reqwest implementation with cookie-jar persistence.
pub struct Client {
    inner: reqwest::blocking::Client,
    options: ClientOptions,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let inner = build_inner(&options)?;
        Ok(Self { inner, options })
    }

    fn apply_auth(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        if let Some(token) = &self.options.token {
            request.header("Authorization", token)
        } else if let Some(username) = &self.options.username {
            request.basic_auth(username, self.options.password.as_deref())
        } else {
            request
        }
    }
}

fn build_inner(options: &ClientOptions) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .cookie_store(true)
        .timeout(
            options
                .max_request_duration
                .unwrap_or(DEFAULT_MAX_REQUEST_DURATION),
        )
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}

fn parse_method(method: &str) -> Result<reqwest::Method> {
    reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| Error::Http(format!("invalid HTTP method: {}", method)))
}

fn into_response(response: reqwest::blocking::Response) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(n, v)| {
            (
                n.as_str().to_string(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = response
        .bytes()
        .map_err(|e| Error::Http(e.to_string()))?
        .to_vec();

    if status >= 300 {
        let response = HttpResponse::new(status, headers, body);
        return Err(Error::Http(format!(
            "HTTP {} for {}: {}",
            status,
            url,
            response.text()
        )));
    }
    Ok(HttpResponse::new(status, headers, body))
}

impl HttpSender for Client {
    fn set_options(&mut self, options: ClientOptions) {
        // Timeout is baked into the inner client, so a new one is built.
        if let Ok(inner) = build_inner(&options) {
            self.inner = inner;
        }
        self.options = options;
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        let mut request = self.inner.request(parse_method(method)?, url);
        request = self.apply_auth(request);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }
        let response = request.send().map_err(|e| Error::Http(e.to_string()))?;
        into_response(response)
    }

    fn upload(&self, upload: &UploadRequest) -> Result<HttpResponse> {
        let mut form = reqwest::blocking::multipart::Form::new();
        for (name, value) in &upload.form_fields {
            form = form.text(name.clone(), value.clone());
        }
        form = form
            .file(upload.file_field_name.clone(), &upload.file)
            .map_err(|e| {
                Error::Http(format!(
                    "unable to read upload file {}: {}",
                    upload.file.display(),
                    e
                ))
            })?;

        let mut request = self
            .inner
            .request(parse_method(&upload.method)?, &upload.url)
            .multipart(form);
        request = self.apply_auth(request);
        for (name, value) in &upload.headers {
            request = request.header(name, value);
        }
        let response = request.send().map_err(|e| Error::Http(e.to_string()))?;
        into_response(response)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(
            200,
            vec![("X-Csrf-Token".to_string(), "abc".to_string())],
            Vec::new(),
        );
        assert_eq!(response.header("x-csrf-token"), Some("abc"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn json_parses_response_body() {
        #[derive(serde::Deserialize)]
        struct Body {
            value: u32,
        }
        let response = HttpResponse::new(200, Vec::new(), br#"{"value":7}"#.to_vec());
        let body: Body = response.json().unwrap();
        assert_eq!(body.value, 7);
    }

    #[test]
    fn mock_replays_responses_in_order() {
        let sender = mock::MockSender::new().respond(200, "first").respond(200, "second");
        let one = sender.send("GET", "http://x/1", None, &[]).unwrap();
        let two = sender.send("GET", "http://x/2", None, &[]).unwrap();
        assert_eq!(one.text(), "first");
        assert_eq!(two.text(), "second");
        assert_eq!(sender.request_count(), 2);
    }

    #[test]
    fn mock_turns_error_status_into_transport_error() {
        let sender = mock::MockSender::new().respond(500, "boom");
        let err = sender.send("GET", "http://x", None, &[]).unwrap_err();
        assert_eq!(err.code(), "HTTP_ERROR");
        assert!(err.to_string().contains("boom"));
    }
}
