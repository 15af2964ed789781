// Comment service - orchestrates the lifecycle operations behind the HTTP
// surface: validation, the "Comment not found" contract, pagination
// envelopes, and the count aggregate on creation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

use crate::{
    config::PageDefaults,
    error::{AppError, AppResult, ValidationErrors},
    models::{
        Comment, CommentForm, CommentInput, CommentPage, PageLinks, PageMeta, Pagination,
        STATUS_ACTIVE,
    },
    query::{CommentQuery, ListParams},
    store::{CommentPatch, CommentStore, NewCommentRecord},
};

const CONTENT_REQUIRED: &str = "The content field is required.";
const STATUS_REQUIRED: &str = "The status field is required.";
const EMAIL_INVALID: &str = "The email must be a valid email address.";
const NAME_INVALID: &str = "The name may only contain letters, numbers, dashes and underscores.";
const COMMENTABLE_TYPE_REQUIRED: &str = "The commentable_type field is required.";
const COMMENTABLE_ID_REQUIRED: &str = "The commentable_id field is required.";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("compile name regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("compile email regex"));

#[derive(Clone)]
pub struct CommentService {
    store: Arc<CommentStore>,
    pages: PageDefaults,
}

impl CommentService {
    pub fn new(store: Arc<CommentStore>, pages: PageDefaults) -> Self {
        Self { store, pages }
    }

    /// Filtered, ordered, paginated listing. `base_path` is the route the
    /// navigation links point back at.
    pub async fn list(&self, params: &ListParams, base_path: &str) -> AppResult<CommentPage> {
        let query = CommentQuery::from_params(params, &self.pages)?;
        let (data, total) = self.store.list_comments(&query).await?;
        Ok(build_page(data, total, &query, base_path))
    }

    pub async fn get(&self, id: i64) -> AppResult<Comment> {
        self.store
            .get_comment(id)
            .await?
            .ok_or_else(AppError::comment_not_found)
    }

    /// API creation path: strict field rules, then insert + count bump.
    pub async fn create(&self, input: CommentInput) -> AppResult<Comment> {
        validate_create(&input)?;
        let record = NewCommentRecord {
            commentable_type: input.commentable_type.unwrap_or_default(),
            commentable_id: input.commentable_id.unwrap_or_default(),
            parent_id: input.parent_id.unwrap_or(0),
            name: normalize(input.name).unwrap_or_else(|| "user".to_string()),
            email: normalize(input.email),
            content: input.content.unwrap_or_default(),
            status: normalize(input.status).unwrap_or_else(|| STATUS_ACTIVE.to_string()),
        };
        let comment = self.store.insert_comment(&record).await?;
        info!(
            "created comment {} on {} {}",
            comment.id, comment.commentable_type, comment.commentable_id
        );
        Ok(comment)
    }

    /// Web-form creation path: only `content` is required, the display name
    /// may be arbitrary text and defaults to "user", `parent_id` defaults
    /// to 0.
    pub async fn create_from_form(&self, form: CommentForm) -> AppResult<Comment> {
        let mut errors = ValidationErrors::new();
        if is_blank(form.content.as_deref()) {
            errors.add("content", CONTENT_REQUIRED);
        }
        errors.into_result()?;

        let record = NewCommentRecord {
            commentable_type: form.commentable_type.unwrap_or_default(),
            commentable_id: parse_form_number(form.commentable_id),
            parent_id: parse_form_number(form.parent_id),
            name: normalize(form.user).unwrap_or_else(|| "user".to_string()),
            email: normalize(form.email),
            content: form.content.unwrap_or_default(),
            status: STATUS_ACTIVE.to_string(),
        };
        let comment = self.store.insert_comment(&record).await?;
        info!(
            "created comment {} via web form on {} {}",
            comment.id, comment.commentable_type, comment.commentable_id
        );
        Ok(comment)
    }

    /// Re-validates like `create` and applies the supplied fields.
    pub async fn update(&self, id: i64, input: CommentInput) -> AppResult<Comment> {
        self.get(id).await?;
        validate_update(&input)?;

        let patch = CommentPatch {
            commentable_type: input.commentable_type,
            commentable_id: input.commentable_id,
            parent_id: input.parent_id,
            name: normalize(input.name),
            email: normalize(input.email),
            content: input.content,
            status: normalize(input.status),
        };
        self.store.update_comment(id, &patch).await?;
        self.get(id).await
    }

    /// Removes the comment. The per-entity count is a total of comments ever
    /// created and stays as it is.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if !self.store.delete_comment(id).await? {
            return Err(AppError::comment_not_found());
        }
        info!("deleted comment {}", id);
        Ok(())
    }

    pub async fn update_status(&self, id: i64, status: Option<String>) -> AppResult<()> {
        let status = require_status(status)?;
        if !self.store.set_status(id, &status).await? {
            return Err(AppError::comment_not_found());
        }
        Ok(())
    }

    /// Applies the status to every listed id; ids without a matching row are
    /// skipped silently.
    pub async fn bulk_update_status(&self, ids: &[i64], status: Option<String>) -> AppResult<()> {
        let status = require_status(status)?;
        let changed = self.store.set_status_bulk(ids, &status).await?;
        info!("bulk status update touched {} of {} comments", changed, ids.len());
        Ok(())
    }

    /// Frontend flagging path: stores the caller-provided status code.
    pub async fn report(&self, id: i64, status: Option<String>) -> AppResult<()> {
        let status = require_status(status)?;
        if !self.store.set_status(id, &status).await? {
            return Err(AppError::comment_not_found());
        }
        info!("comment {} reported with status {}", id, status);
        Ok(())
    }

    pub async fn count_for(&self, commentable_type: &str, commentable_id: i64) -> AppResult<i64> {
        Ok(self.store.count_for(commentable_type, commentable_id).await?)
    }
}

fn build_page(data: Vec<Comment>, total: i64, query: &CommentQuery, base_path: &str) -> CommentPage {
    let total_pages = if total <= 0 {
        1
    } else {
        ((total as u64).div_ceil(u64::from(query.per_page))) as u32
    };
    let current_page = query.page;
    let links = PageLinks {
        previous: (current_page > 1).then(|| format!("{}?page={}", base_path, current_page - 1)),
        next: (current_page < total_pages)
            .then(|| format!("{}?page={}", base_path, current_page + 1)),
    };
    let count = data.len() as i64;
    CommentPage {
        data,
        meta: PageMeta {
            pagination: Pagination {
                total,
                count,
                per_page: query.per_page,
                current_page,
                total_pages,
                links,
            },
        },
    }
}

fn validate_create(input: &CommentInput) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    if is_blank(input.commentable_type.as_deref()) {
        errors.add("commentable_type", COMMENTABLE_TYPE_REQUIRED);
    }
    if input.commentable_id.is_none() {
        errors.add("commentable_id", COMMENTABLE_ID_REQUIRED);
    }
    validate_common(&mut errors, input);
    errors.into_result()
}

fn validate_update(input: &CommentInput) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    validate_common(&mut errors, input);
    errors.into_result()
}

fn validate_common(errors: &mut ValidationErrors, input: &CommentInput) {
    if is_blank(input.content.as_deref()) {
        errors.add("content", CONTENT_REQUIRED);
    }
    if let Some(name) = input.name.as_deref().filter(|name| !name.trim().is_empty()) {
        if !NAME_RE.is_match(name) {
            errors.add("name", NAME_INVALID);
        }
    }
    if let Some(email) = input.email.as_deref().filter(|email| !email.trim().is_empty()) {
        if !EMAIL_RE.is_match(email) {
            errors.add("email", EMAIL_INVALID);
        }
    }
}

fn require_status(status: Option<String>) -> AppResult<String> {
    match normalize(status) {
        Some(status) => Ok(status),
        None => {
            let mut errors = ValidationErrors::new();
            errors.add("status", STATUS_REQUIRED);
            Err(AppError::Validation(errors))
        }
    }
}

/// Maps empty or whitespace-only strings to None.
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |text| text.trim().is_empty())
}

/// Form numbers arrive as text; anything unparseable counts as absent and
/// falls back to 0.
fn parse_form_number(value: Option<String>) -> i64 {
    value
        .as_deref()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(content: &str, name: &str, email: &str) -> CommentInput {
        CommentInput {
            commentable_type: Some("post".to_string()),
            commentable_id: Some(1),
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            content: Some(content.to_string()),
            ..CommentInput::default()
        }
    }

    #[test]
    fn create_accepts_valid_input() {
        assert!(validate_create(&input("hello", "alice_1", "a@b.com")).is_ok());
    }

    #[test]
    fn create_requires_content() {
        let err = validate_create(&input("  ", "alice", "a@b.com")).unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("content")),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn name_rejects_spaces_and_punctuation() {
        let err = validate_create(&input("hello", "not a name!", "a@b.com")).unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("name")),
            other => panic!("expected validation error, got {other}"),
        }
        assert!(validate_create(&input("hello", "ok-name_9", "a@b.com")).is_ok());
    }

    #[test]
    fn email_must_look_like_an_address() {
        let err = validate_create(&input("hello", "alice", "Invalid email data")).unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("email")),
            other => panic!("expected validation error, got {other}"),
        }
        assert!(validate_create(&input("hello", "alice", "user@mail.example.com")).is_ok());
    }

    #[test]
    fn empty_email_and_name_are_allowed() {
        let mut payload = input("hello", "", "");
        payload.name = None;
        assert!(validate_create(&payload).is_ok());
    }

    #[test]
    fn status_is_required_non_empty() {
        assert!(require_status(Some("reported".to_string())).is_ok());
        assert!(require_status(Some("  ".to_string())).is_err());
        assert!(require_status(None).is_err());
    }

    #[test]
    fn form_numbers_parse_leniently() {
        assert_eq!(parse_form_number(Some("7".to_string())), 7);
        assert_eq!(parse_form_number(Some("".to_string())), 0);
        assert_eq!(parse_form_number(Some("x".to_string())), 0);
        assert_eq!(parse_form_number(None), 0);
    }
}
