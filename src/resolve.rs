//! Lazy User/Group handles with single-flight resolution.
//!
//! A handle starts out knowing only its identity key (username or numeric
//! id). The first field access fetches the remote resource; every access
//! issued while that fetch is in flight suspends and receives the same
//! settled result. A handle is resolved at most once: success and failure
//! are both terminal, there is no re-fetch and no TTL.
//!
//! Resolution stays shallow on purpose: a user's groups come back as fresh
//! unresolved [`GroupHandle`]s and a group's members as fresh unresolved
//! [`UserHandle`]s, so walking the graph only fetches what is actually
//! touched. Handle clones share their resolution state; two independently
//! constructed handles for the same logical entity do not.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::{ApiRequest, Gateway};

/// Extract the identity key from a resource URL: its second-to-last path
/// segment (`.../users/alice/` -> `alice`, `.../groups/7/` -> `7`).
pub(crate) fn identity_key(url: &str) -> Option<&str> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    let key = parts[parts.len() - 2];
    (!key.is_empty()).then_some(key)
}

/// Single-flight lazy slot: `Unloaded -> Loading -> settled`.
///
/// The first accessor runs the fetch while holding the state lock; later
/// accessors suspend on the lock and wake to the settled result. Both
/// outcomes are terminal.
struct LazyCell<T> {
    state: Mutex<Option<Result<Arc<T>>>>,
    loading: AtomicBool,
    loaded: AtomicBool,
}

impl<T> LazyCell<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            loading: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
        }
    }

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.state.lock().await;
        if let Some(settled) = state.as_ref() {
            return settled.clone();
        }

        self.loading.store(true, Ordering::SeqCst);
        let outcome = fetch().await.map(Arc::new);
        self.loading.store(false, Ordering::SeqCst);
        if outcome.is_ok() {
            self.loaded.store(true, Ordering::SeqCst);
        }

        *state = Some(outcome.clone());
        outcome
    }
}

// ============================================================================
// User
// ============================================================================

/// Resolved user data, shared by all clones of a handle.
pub struct UserRecord {
    pub groups: Vec<GroupHandle>,
    /// Resource URLs of the user's own projects.
    pub projects: Vec<String>,
    /// Resource URLs of projects the user collaborates on.
    pub collaborations: Vec<String>,
    /// Reserved: the backend never populates this today.
    pub ratings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    scripts: Vec<String>,
    #[serde(default)]
    collaborations: Vec<String>,
    #[serde(default)]
    ratings: Vec<Value>,
}

/// Lazily resolved user. Cloning shares resolution state.
#[derive(Clone)]
pub struct UserHandle {
    username: String,
    gateway: Arc<Gateway>,
    cell: Arc<LazyCell<UserRecord>>,
}

impl UserHandle {
    pub(crate) fn new(username: &str, gateway: Arc<Gateway>) -> Self {
        Self {
            username: username.to_string(),
            gateway,
            cell: Arc::new(LazyCell::new()),
        }
    }

    /// The identity key; available without resolution.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.cell.is_loading()
    }

    /// Resolve (if needed) and return the full record.
    pub async fn resolve(&self) -> Result<Arc<UserRecord>> {
        let gateway = Arc::clone(&self.gateway);
        let username = self.username.clone();
        self.cell
            .get_or_fetch(|| fetch_user(gateway, username))
            .await
    }

    /// Groups the user belongs to, as fresh unresolved handles.
    pub async fn groups(&self) -> Result<Vec<GroupHandle>> {
        Ok(self.resolve().await?.groups.clone())
    }

    pub async fn projects(&self) -> Result<Vec<String>> {
        Ok(self.resolve().await?.projects.clone())
    }

    pub async fn collaborations(&self) -> Result<Vec<String>> {
        Ok(self.resolve().await?.collaborations.clone())
    }

    pub async fn ratings(&self) -> Result<Vec<Value>> {
        Ok(self.resolve().await?.ratings.clone())
    }
}

async fn fetch_user(gateway: Arc<Gateway>, username: String) -> Result<UserRecord> {
    debug!(username = %username, "resolving user");
    let json = gateway
        .send(ApiRequest::get(format!("users/{}/", username)).public())
        .await?
        .ok_or_else(|| Error::RequestFailed("empty user response".to_string()))?;
    let wire: WireUser = serde_json::from_value(json)
        .map_err(|e| Error::RequestFailed(format!("malformed user response: {}", e)))?;

    let groups = wire
        .groups
        .iter()
        .filter_map(|url| identity_key(url))
        .filter_map(|key| key.parse::<u64>().ok())
        .map(|id| GroupHandle::new(id, Arc::clone(&gateway)))
        .collect();

    Ok(UserRecord {
        groups,
        projects: wire.scripts,
        collaborations: wire.collaborations,
        ratings: wire.ratings,
    })
}

// ============================================================================
// Group
// ============================================================================

/// Resolved group data, shared by all clones of a handle.
pub struct GroupRecord {
    pub name: String,
    pub user_set: Vec<UserHandle>,
}

#[derive(Debug, Deserialize)]
struct WireGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    user_set: Vec<String>,
}

/// Lazily resolved group. Cloning shares resolution state.
#[derive(Clone)]
pub struct GroupHandle {
    id: u64,
    url: String,
    gateway: Arc<Gateway>,
    cell: Arc<LazyCell<GroupRecord>>,
}

impl std::fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl GroupHandle {
    pub(crate) fn new(id: u64, gateway: Arc<Gateway>) -> Self {
        let url = format!("{}groups/{}/", gateway.base(), id);
        Self {
            id,
            url,
            gateway,
            cell: Arc::new(LazyCell::new()),
        }
    }

    /// The identity key; available without resolution.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The group's resource URL; available without resolution.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.cell.is_loading()
    }

    /// Resolve (if needed) and return the full record.
    pub async fn resolve(&self) -> Result<Arc<GroupRecord>> {
        let gateway = Arc::clone(&self.gateway);
        let id = self.id;
        self.cell.get_or_fetch(|| fetch_group(gateway, id)).await
    }

    pub async fn name(&self) -> Result<String> {
        Ok(self.resolve().await?.name.clone())
    }

    /// Members of the group, as fresh unresolved handles.
    pub async fn user_set(&self) -> Result<Vec<UserHandle>> {
        Ok(self.resolve().await?.user_set.clone())
    }
}

async fn fetch_group(gateway: Arc<Gateway>, id: u64) -> Result<GroupRecord> {
    debug!(id = id, "resolving group");
    let json = gateway
        .send(ApiRequest::get(format!("groups/{}/", id)).public())
        .await?
        .ok_or_else(|| Error::RequestFailed("empty group response".to_string()))?;
    let wire: WireGroup = serde_json::from_value(json)
        .map_err(|e| Error::RequestFailed(format!("malformed group response: {}", e)))?;

    let user_set = wire
        .user_set
        .iter()
        .filter_map(|url| identity_key(url))
        .map(|username| UserHandle::new(username, Arc::clone(&gateway)))
        .collect();

    Ok(GroupRecord {
        name: wire.name,
        user_set,
    })
}
