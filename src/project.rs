//! Project domain types and their wire mapping.
//!
//! The backend speaks `{name, description, files: [{name, content}],
//! is_public, language}`; the domain side uses `title`/`files` and carries
//! the author as a display identity extracted from the author resource URL.
//! Create/update always serialize the full file list.

use serde::{Deserialize, Serialize};

use crate::resolve::identity_key;

/// A single file in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub title: String,
    pub content: String,
}

/// A shareable project: an ordered list of scripts plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    pub title: String,
    pub description: String,
    /// Display identity of the author, extracted from the author URL.
    pub author: String,
    pub files: Vec<Script>,
    pub uuid: String,
    pub is_public: bool,
    pub language: String,
}

impl Project {
    /// A private single-file project, as produced by the one-file
    /// convenience constructor.
    pub fn single_file(name: &str, content: &str, language: &str) -> Self {
        Self {
            title: name.to_string(),
            description: String::new(),
            language: language.to_string(),
            files: vec![Script {
                title: name.to_string(),
                content: content.to_string(),
            }],
            is_public: false,
            ..Default::default()
        }
    }

    pub(crate) fn payload(&self) -> ProjectPayload {
        ProjectPayload {
            name: self.title.clone(),
            description: self.description.clone(),
            files: self.files.iter().map(WireScript::from).collect(),
            is_public: self.is_public,
            language: self.language.clone(),
        }
    }

    pub(crate) fn from_wire(wire: WireProject) -> Self {
        Self {
            title: wire.name,
            description: wire.description,
            author: identity_key(&wire.author).unwrap_or_default().to_string(),
            files: wire
                .files
                .into_iter()
                .map(|f| Script {
                    title: f.name,
                    content: f.content,
                })
                .collect(),
            uuid: wire.id,
            is_public: wire.is_public,
            language: wire.language,
        }
    }
}

/// Map a filename suffix to a project language.
pub(crate) fn language_for_filename(name: &str) -> &'static str {
    if name.ends_with(".py") {
        "python"
    } else if name.ends_with(".xw") {
        "xcas"
    } else {
        tracing::warn!(file = name, "unknown file extension, defaulting to python");
        "python"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireScript {
    pub name: String,
    pub content: String,
}

impl From<&Script> for WireScript {
    fn from(script: &Script) -> Self {
        Self {
            name: script.title.clone(),
            content: script.content.clone(),
        }
    }
}

/// Request body for create/update.
#[derive(Debug, Serialize)]
pub(crate) struct ProjectPayload {
    pub name: String,
    pub description: String,
    pub files: Vec<WireScript>,
    pub is_public: bool,
    pub language: String,
}

/// Project as returned by the backend.
#[derive(Debug, Deserialize)]
pub(crate) struct WireProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub files: Vec<WireScript>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub language: String,
}

/// Paginated project listing.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectList {
    pub results: Vec<WireProject>,
}
