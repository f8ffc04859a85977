//! Request gateway: authenticated JSON requests with status enforcement.
//!
//! Every request is built the same way: JSON content type, `Token` auth
//! header whenever a token is present, the body serialized for non-read
//! methods, and a single attempt against the configured base URL. Requests
//! are gated on the readiness signal unless explicitly exempted (the
//! startup identity check itself must not wait on the gate it releases).

use std::sync::Arc;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::ready::ReadySignal;
use crate::session::Session;

/// A request to the Workshop API.
///
/// Defaults match the common case: expect 200, require login, wait for
/// readiness.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    endpoint: String,
    method: Method,
    body: Option<Value>,
    expected: Option<StatusCode>,
    login_required: bool,
    skip_ready: bool,
}

impl ApiRequest {
    fn new(method: Method, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body,
            expected: Some(StatusCode::OK),
            login_required: true,
            skip_ready: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, None)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint, Some(body))
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint, Some(body))
    }

    /// Expect this status instead of 200.
    pub fn expect(mut self, status: StatusCode) -> Self {
        self.expected = Some(status);
        self
    }

    /// Accept any response status.
    pub fn any_status(mut self) -> Self {
        self.expected = None;
        self
    }

    /// Allow the request without a login session.
    pub fn public(mut self) -> Self {
        self.login_required = false;
        self
    }

    /// Issue the request without waiting for the readiness signal.
    pub fn skip_ready(mut self) -> Self {
        self.skip_ready = true;
        self
    }
}

/// Shared request layer over the session and readiness signal.
pub struct Gateway {
    http: Client,
    base: Url,
    session: Arc<Session>,
    ready: ReadySignal,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(config: &ClientConfig, session: Arc<Session>, ready: ReadySignal) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base url {:?}: {}", config.base_url, e)))?;
        // Relative joins drop the last path segment without this.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: Client::new(),
            base,
            session,
            ready,
        })
    }

    /// The normalized base URL (always slash-terminated).
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve an endpoint against the base URL.
    pub fn url(&self, endpoint: &str) -> Result<Url> {
        self.base
            .join(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))
    }

    /// Issue a request and return the parsed JSON body.
    ///
    /// `Ok(None)` means the response body was empty or not JSON, which is a
    /// success for endpoints like logout that answer 204 with no payload.
    /// Status mismatches fail with [`Error::UnexpectedStatus`]; there are no
    /// retries.
    pub async fn send(&self, request: ApiRequest) -> Result<Option<Value>> {
        if !request.skip_ready {
            self.ready.wait().await;
        }

        let logged_in = self.session.is_logged_in();
        if request.login_required && !logged_in {
            return Err(Error::AuthRequired);
        }

        let url = self.url(&request.endpoint)?;
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(header::CONTENT_TYPE, "application/json");

        // An already-authenticated caller is always identified, even when
        // login is not required.
        if logged_in {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Token {}", self.session.token()),
            );
        }

        if request.method != Method::GET && request.method != Method::HEAD {
            let body = request.body.unwrap_or_else(|| Value::Object(Default::default()));
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(endpoint = %request.endpoint, status = status.as_u16(), "api response");

        if let Some(expected) = request.expected {
            if status != expected {
                return Err(Error::UnexpectedStatus {
                    expected: expected.as_u16(),
                    actual: status.as_u16(),
                });
            }
        }

        Ok(response.json::<Value>().await.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer, session: Arc<Session>) -> Gateway {
        let ready = ReadySignal::new();
        ready.fire();
        Gateway::new(&ClientConfig::new(server.uri()), session, ready).expect("valid config")
    }

    #[tokio::test]
    async fn test_login_required_without_token() {
        let server = MockServer::start().await;
        let gateway = gateway_for(&server, Arc::new(Session::default()));

        let err = gateway
            .send(ApiRequest::post("scripts/", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthRequired));
    }

    #[tokio::test]
    async fn test_token_header_attached_even_for_public_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scripts/"))
            .and(header("Authorization", "Token abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(Session::default());
        session.set_token("abc");
        let gateway = gateway_for(&server, session);

        let body = gateway
            .send(ApiRequest::get("scripts/").public())
            .await
            .expect("request should succeed");
        assert_eq!(body, Some(json!({"results": []})));
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scripts/missing/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server, Arc::new(Session::default()));
        let err = gateway
            .send(ApiRequest::get("scripts/missing/").public())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedStatus {
                expected: 200,
                actual: 404
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_body_is_none_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let session = Arc::new(Session::default());
        session.set_token("abc");
        let gateway = gateway_for(&server, session);

        let body = gateway
            .send(
                ApiRequest::post("api/auth/logout/", json!({}))
                    .expect(StatusCode::NO_CONTENT),
            )
            .await
            .expect("204 is the expected status");
        assert_eq!(body, None);
    }

    #[tokio::test]
    async fn test_request_waits_for_readiness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scripts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let ready = ReadySignal::new();
        let gateway = Arc::new(
            Gateway::new(
                &ClientConfig::new(server.uri()),
                Arc::new(Session::default()),
                ready.clone(),
            )
            .expect("valid config"),
        );

        let pending = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.send(ApiRequest::get("scripts/").public()).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        ready.fire();
        let body = pending
            .await
            .expect("task should not panic")
            .expect("request should succeed");
        assert!(body.is_some());
    }

    #[test]
    fn test_base_url_normalized() {
        let session = Arc::new(Session::default());
        let gateway = Gateway::new(
            &ClientConfig::new("http://example.org/workshop"),
            session,
            ReadySignal::new(),
        )
        .expect("valid config");
        assert_eq!(gateway.base().path(), "/workshop/");
        assert_eq!(
            gateway.url("scripts/").expect("joinable").as_str(),
            "http://example.org/workshop/scripts/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Gateway::new(
            &ClientConfig::new("not a url"),
            Arc::new(Session::default()),
            ReadySignal::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
