// Comment records and the request/response types exchanged with the HTTP
// surface. Everything crossing the wire lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status a comment carries right after creation.
pub const STATUS_ACTIVE: &str = "active";

/// Conventional status set by the frontend report endpoint. The column is an
/// opaque code, callers may store any non-empty value.
pub const STATUS_REPORTED: &str = "reported";

/// A single comment row. `parent_id` of 0 marks a top-level comment,
/// otherwise it carries the id of another comment. The tree is lookup-only:
/// nothing enforces that the parent exists or that the chain is acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub commentable_type: String,
    pub commentable_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized per-entity aggregate: how many comments were ever created
/// for a (commentable_type, commentable_id) key. Deleting comments does not
/// decrement it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentCount {
    pub commentable_type: String,
    pub commentable_id: i64,
    pub count: i64,
}

/// Create/update payload for the JSON APIs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    pub commentable_type: Option<String>,
    pub commentable_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "de_opt_status")]
    pub status: Option<String>,
}

/// Payload of the plain web form. The display name arrives as `user` and may
/// contain arbitrary text; numeric fields are kept as strings so a malformed
/// form still reaches the handler (the form path always redirects).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    pub commentable_type: Option<String>,
    pub commentable_id: Option<String>,
    pub user: Option<String>,
    pub email: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<String>,
}

/// Body of `PUT .../status/{id}` and `PUT .../report/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusInput {
    #[serde(default, deserialize_with = "de_opt_status")]
    pub status: Option<String>,
}

/// Body of `PUT .../status/bulk`. The field is called `id` on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkStatusInput {
    #[serde(default, deserialize_with = "de_opt_status")]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Vec<i64>,
}

/// `{"data": ...}` envelope shared by single-record responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// `{"success": true}` envelope for mutations without a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// One page of comments plus pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPage {
    pub data: Vec<Comment>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    /// Rows matching the filters, across all pages.
    pub total: i64,
    /// Rows on this page.
    pub count: i64,
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: u32,
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Accepts a JSON string or integer for `status`; numbers are stored in
/// their decimal form. Clients send both.
fn de_opt_status<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value {
        Raw::Text(text) => text,
        Raw::Int(code) => code.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_string_and_integer() {
        let input: StatusInput = serde_json::from_str(r#"{"status": "spam"}"#).unwrap();
        assert_eq!(input.status.as_deref(), Some("spam"));

        let input: StatusInput = serde_json::from_str(r#"{"status": 4}"#).unwrap();
        assert_eq!(input.status.as_deref(), Some("4"));

        let input: StatusInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input.status, None);
    }

    #[test]
    fn bulk_status_reads_id_list() {
        let input: BulkStatusInput =
            serde_json::from_str(r#"{"status": "hidden", "id": [1, 2, 3]}"#).unwrap();
        assert_eq!(input.status.as_deref(), Some("hidden"));
        assert_eq!(input.id, vec![1, 2, 3]);
    }

    #[test]
    fn page_links_omit_missing_directions() {
        let links = PageLinks::default();
        assert_eq!(serde_json::to_string(&links).unwrap(), "{}");
    }
}
