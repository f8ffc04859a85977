//! Workshop Client - Session and object graph for the Workshop API
//!
//! Provides authenticated access to a Workshop script-sharing backend:
//!
//! - **Session**: pluggable token store with derived login state
//! - **Readiness**: one-shot gate fired after the startup identity check
//! - **Gateway**: authenticated JSON requests with status enforcement
//! - **Domain operations**: project CRUD, login/logout, registration
//! - **Lazy handles**: User/Group resolution on first field access, with
//!   single-flight deduplication per handle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            WorkshopClient               │
//! │  (login, projects, register, handles)   │
//! └────────────────┬────────────────────────┘
//!                  │
//!           ┌──────┴──────┐
//!           ▼             ▼
//!     ┌──────────┐  ┌───────────────┐
//!     │ Gateway  │  │ UserHandle /  │
//!     │          │◄─┤ GroupHandle   │
//!     └────┬─────┘  └───────────────┘
//!          │
//!    ┌─────┴─────┐
//!    ▼           ▼
//! ┌────────┐ ┌─────────────┐
//! │Session │ │ ReadySignal │
//! └────────┘ └─────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod project;
pub mod ready;
pub mod resolve;
pub mod session;

// Re-export main types for convenience
pub use client::{Registration, WorkshopClient};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use gateway::{ApiRequest, Gateway};
pub use project::{Project, Script};
pub use ready::ReadySignal;
pub use resolve::{GroupHandle, UserHandle};
pub use session::{MemoryTokenStore, Session, TokenStore};
