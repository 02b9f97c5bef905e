use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A free-text annotation. `element_id == None` marks a general comment on
/// the whole model; otherwise the comment is scoped to exactly one element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub element_name: Option<String>,
    // epoch milliseconds
    pub timestamp: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommentCounts {
    pub general: usize,
    pub scoped: usize,
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Append-only comment store; the only removal is an explicit delete by id.
#[derive(Clone, Debug, Default)]
pub struct AnnotationStore {
    comments: Vec<Comment>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self { comments: Vec::new() }
    }

    /// Append a comment with a fresh id and the current timestamp. Blank
    /// text (after trimming) is rejected silently and the store is left
    /// untouched; this is an interface precondition, not an error.
    pub fn add(
        &mut self,
        text: &str,
        element_id: Option<&str>,
        element_name: Option<&str>,
    ) -> Option<&Comment> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.comments.push(Comment {
            id: Uuid::now_v7().to_string(),
            text: trimmed.to_string(),
            element_id: element_id.map(str::to_string),
            element_name: element_name.map(str::to_string),
            timestamp: now_millis(),
        });
        self.comments.last()
    }

    // Deletion is permanent and idempotent on unknown ids
    pub fn delete(&mut self, id: &str) {
        self.comments.retain(|c| c.id != id);
    }

    pub fn clear(&mut self) {
        self.comments.clear();
    }

    /// With an element id: only the comments scoped to that element, in store
    /// order. Without one: every comment, general and scoped alike —
    /// filtering narrows, it never widens beyond "all".
    pub fn filter_by_element(&self, element_id: Option<&str>) -> Vec<&Comment> {
        match element_id {
            Some(id) => self
                .comments
                .iter()
                .filter(|c| c.element_id.as_deref() == Some(id))
                .collect(),
            None => self.comments.iter().collect(),
        }
    }

    pub fn counts(&self) -> CommentCounts {
        let scoped = self.comments.iter().filter(|c| c.element_id.is_some()).count();
        CommentCounts { general: self.comments.len() - scoped, scoped }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}
