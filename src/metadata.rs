//! Submission metadata supplied by the grading platform.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Student identifier in grading service requests.
///
/// Real submissions carry the platform user id; `-1` is reserved for the
/// setup run that seeds instructor defaults.
pub const SETUP_STUDENT_ID: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct Assignment {
    title: String,
}

/// The platform-written metadata describing whose submission this is and
/// which assignment it belongs to. Unrelated platform fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(default)]
    users: Vec<User>,
    assignment: Assignment,
    #[serde(skip)]
    path: PathBuf,
}

impl SubmissionMetadata {
    /// Loads submission metadata.
    ///
    /// The user list is not validated here: setup runs upload under the
    /// sentinel id and need only the assignment title.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut metadata: Self = serde_json::from_str(&contents).map_err(|e| Error::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        metadata.path = path.to_path_buf();
        Ok(metadata)
    }

    /// Id of the submitting student (first listed user). Errors when the
    /// platform listed no users.
    pub fn student_id(&self) -> Result<i64> {
        match self.users.first() {
            Some(user) => Ok(user.id),
            None => Err(Error::Metadata {
                path: self.path.clone(),
                reason: "no users listed".to_string(),
            }),
        }
    }

    /// URL-safe assignment identifier derived from the title.
    pub fn assignment_slug(&self) -> String {
        sanitize_title(&self.assignment.title)
    }
}

/// Collapses whitespace runs to `_` and drops every character that is not
/// alphanumeric, `_`, or `-`. The result is stable across runs of the same
/// assignment, so it doubles as the service-side grouping key.
pub fn sanitize_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for c in title.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('_');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            if c.is_alphanumeric() || c == '_' || c == '-' {
                slug.push(c);
            }
        }
    }
    slug
}
