//! Workshop client: domain operations over the request gateway.
//!
//! Construction spawns the startup identity check, which settles the
//! session (confirming or discarding any persisted token) and then fires
//! the readiness signal exactly once. Gated operations issued before that
//! simply wait.

use std::sync::Arc;

use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::gateway::{ApiRequest, Gateway};
use crate::project::{language_for_filename, Project, ProjectList, WireProject};
use crate::ready::ReadySignal;
use crate::resolve::{GroupHandle, UserHandle};
use crate::session::{MemoryTokenStore, Session, TokenStore};

/// Outcome of a registration attempt.
///
/// Rejections (e.g. a taken username) are not errors: the server's response
/// body is returned for inspection with `success == false`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub success: bool,
    pub response: Value,
}

/// Client for the Workshop API. Cheap to clone; clones share the session.
///
/// Must be constructed inside a tokio runtime: the startup identity check
/// runs as a spawned task.
#[derive(Clone)]
pub struct WorkshopClient {
    gateway: Arc<Gateway>,
    session: Arc<Session>,
    ready: ReadySignal,
}

impl WorkshopClient {
    /// Create a client with an in-memory token store.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_store(config, Box::new(MemoryTokenStore::new()))
    }

    /// Create a client backed by the given token store.
    pub fn with_store(config: ClientConfig, store: Box<dyn TokenStore>) -> Result<Self> {
        let session = Arc::new(Session::new(store));
        let ready = ReadySignal::new();
        let gateway = Arc::new(Gateway::new(&config, Arc::clone(&session), ready.clone())?);

        let client = Self {
            gateway,
            session,
            ready,
        };

        info!(base_url = %client.gateway.base(), "workshop client created");

        // One-time identity check; fires the readiness signal when done.
        let init = client.clone();
        tokio::spawn(async move { init.refresh_identity().await });

        Ok(client)
    }

    /// Wait until the startup identity check has completed.
    pub async fn wait_ready(&self) {
        self.ready.wait().await;
    }

    /// Whether the startup identity check has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// The underlying session (token access and derived login state).
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a session token is currently present.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Username of the current identity, or empty when logged out.
    pub fn username(&self) -> String {
        self.session.username()
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Log in with HTTP Basic credentials and persist the returned token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = self.gateway.url("api/auth/login/")?;
        let response = self
            .gateway
            .http()
            .post(url)
            .basic_auth(username, Some(password))
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Error::InvalidCredentials);
        }

        let body: Value = response.json().await.map_err(|_| Error::TokenMissing)?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or(Error::TokenMissing)?;
        let name = body
            .pointer("/user/username")
            .and_then(Value::as_str)
            .ok_or(Error::InvalidCredentials)?;

        self.session.set_token(token);
        self.session.set_username(name);
        info!(username = %name, "logged in");

        Ok(name.to_string())
    }

    /// Log out: best-effort server-side token invalidation, then an
    /// unconditional local clear. A no-op success when not logged in.
    pub async fn logout(&self) -> Result<bool> {
        if !self.is_logged_in() {
            warn!("logout requested while not logged in");
            return Ok(true);
        }

        if let Err(e) = self
            .gateway
            .send(ApiRequest::post("api/auth/logout/", json!({})).expect(StatusCode::NO_CONTENT))
            .await
        {
            warn!(error = %e, "failed to invalidate token on server");
        }

        self.clear_identity();
        info!("logged out");
        Ok(true)
    }

    /// One-time startup identity check. Confirms a persisted token against
    /// the backend (discarding it on failure), then fires the readiness
    /// signal. Firing again is a no-op, so re-entry is harmless.
    async fn refresh_identity(&self) {
        if !self.is_logged_in() {
            self.session.set_username("");
        } else {
            match self
                .gateway
                .send(ApiRequest::get("current_user/").public().skip_ready())
                .await
            {
                Ok(Some(body)) => {
                    if let Some(name) = body.get("username").and_then(Value::as_str) {
                        self.session.set_username(name);
                    }
                }
                Ok(None) => {
                    warn!("identity check returned no body, discarding session");
                    self.clear_identity();
                }
                Err(e) => {
                    warn!(error = %e, "identity check failed, discarding session");
                    self.clear_identity();
                }
            }
        }

        debug!("identity refreshed");
        self.ready.fire();
    }

    fn clear_identity(&self) {
        self.session.set_token("");
        self.session.set_username("");
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a new account. Any response status is accepted; success is
    /// determined by the echoed username, so rejections come back as
    /// `Registration { success: false, .. }` rather than an error.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Registration> {
        let body = json!({
            "username": username,
            "password": password,
            "email": email,
        });
        let response = required(
            self.gateway
                .send(ApiRequest::post("register/", body).any_status().public())
                .await?,
            "registration",
        )?;

        let success = response.get("username").and_then(Value::as_str) == Some(username);
        Ok(Registration { success, response })
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// List projects, optionally filtered by a search query.
    pub async fn list_projects(&self, query: &str) -> Result<Vec<Project>> {
        let endpoint = if query.is_empty() {
            "scripts/".to_string()
        } else {
            format!("scripts/?search={}", urlencoding::encode(query))
        };
        let body = required(
            self.gateway.send(ApiRequest::get(endpoint).public()).await?,
            "project list",
        )?;
        let list: ProjectList = serde_json::from_value(body)
            .map_err(|e| Error::RequestFailed(format!("malformed project list: {}", e)))?;
        Ok(list.results.into_iter().map(Project::from_wire).collect())
    }

    /// Fetch a single project by UUID.
    pub async fn get_project(&self, uuid: &str) -> Result<Project> {
        let body = required(
            self.gateway
                .send(ApiRequest::get(format!("scripts/{}/", uuid)).public())
                .await?,
            "project",
        )?;
        let wire: WireProject = serde_json::from_value(body)
            .map_err(|e| Error::RequestFailed(format!("malformed project: {}", e)))?;
        Ok(Project::from_wire(wire))
    }

    /// Create a project and return its UUID. The full file list is always
    /// sent.
    pub async fn create_project(&self, project: &Project) -> Result<String> {
        let payload = serde_json::to_value(project.payload())
            .map_err(|e| Error::RequestFailed(format!("unserializable project: {}", e)))?;
        let body = required(
            self.gateway
                .send(ApiRequest::post("scripts/", payload).expect(StatusCode::CREATED))
                .await?,
            "create project",
        )?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::RequestFailed("create response missing id".to_string()))
    }

    /// Create a private single-file project, deriving the language from the
    /// filename suffix.
    pub async fn create_one_file_project(&self, name: &str, content: &str) -> Result<String> {
        let language = language_for_filename(name);
        let project = Project::single_file(name, content, language);
        self.create_project(&project).await
    }

    /// Replace a project on the server with the given one (full
    /// replacement, keyed by its UUID).
    pub async fn update_project(&self, project: &Project) -> Result<Option<Value>> {
        let payload = serde_json::to_value(project.payload())
            .map_err(|e| Error::RequestFailed(format!("unserializable project: {}", e)))?;
        self.gateway
            .send(ApiRequest::put(
                format!("scripts/{}/", project.uuid),
                payload,
            ))
            .await
    }

    // ========================================================================
    // Lazy entity handles
    // ========================================================================

    /// A fresh lazy handle for the given user. Nothing is fetched until a
    /// field is accessed.
    pub fn user(&self, username: &str) -> UserHandle {
        UserHandle::new(username, Arc::clone(&self.gateway))
    }

    /// A fresh lazy handle for the given group.
    pub fn group(&self, id: u64) -> GroupHandle {
        GroupHandle::new(id, Arc::clone(&self.gateway))
    }
}

fn required(body: Option<Value>, what: &str) -> Result<Value> {
    body.ok_or_else(|| Error::RequestFailed(format!("empty {} response", what)))
}
