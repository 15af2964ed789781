// Typed query specification for comment listings. Request parameters arrive
// as untyped JSON strings (`constraints`, `order_by`) plus plain `search` and
// paging values; everything is parsed against a field whitelist before any
// SQL is assembled, and all values reach the database as bind parameters.

use crate::{
    config::PageDefaults,
    error::{AppError, AppResult},
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

/// Raw query-string parameters of the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub constraints: Option<String>,
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Comment columns addressable from `constraints` and `order_by`. Unknown
/// names are rejected with a BadRequest, never spliced into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentField {
    Id,
    CommentableType,
    CommentableId,
    ParentId,
    Name,
    Email,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl CommentField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "commentable_type" => Some(Self::CommentableType),
            "commentable_id" => Some(Self::CommentableId),
            "parent_id" => Some(Self::ParentId),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "status" => Some(Self::Status),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CommentableType => "commentable_type",
            Self::CommentableId => "commentable_id",
            Self::ParentId => "parent_id",
            Self::Name => "name",
            Self::Email => "email",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact match on a whitelisted column.
    Equals(CommentField, FilterValue),
    /// Substring match over the commenter name.
    NameContains(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Parsed and validated list query. Filters AND together; an empty `order`
/// means the default newest-first ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentQuery {
    pub filters: Vec<Filter>,
    pub order: Vec<(CommentField, SortDirection)>,
    pub page: u32,
    pub per_page: u32,
}

impl CommentQuery {
    pub fn from_params(params: &ListParams, pages: &PageDefaults) -> AppResult<Self> {
        let mut filters = Vec::new();

        if let Some(raw) = non_empty(params.constraints.as_deref()) {
            let map = parse_object(raw, "constraints")?;
            for (key, value) in map {
                let field = parse_field(&key)?;
                filters.push(Filter::Equals(field, parse_value(&key, value)?));
            }
        }

        if let Some(term) = non_empty(params.search.as_deref()) {
            filters.push(Filter::NameContains(term.to_string()));
        }

        let mut order = Vec::new();
        if let Some(raw) = non_empty(params.order_by.as_deref()) {
            let map = parse_object(raw, "order_by")?;
            for (key, value) in map {
                let field = parse_field(&key)?;
                let direction = value
                    .as_str()
                    .and_then(SortDirection::parse)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Sort direction for `{}` must be \"asc\" or \"desc\".",
                            key
                        ))
                    })?;
                order.push((field, direction));
            }
        }

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params
            .per_page
            .unwrap_or(pages.per_page)
            .clamp(1, pages.max_per_page);

        Ok(Self {
            filters,
            order,
            page,
            per_page,
        })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// Appends ` WHERE ...` with bound values. No-op without filters.
    pub fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if self.filters.is_empty() {
            return;
        }
        qb.push(" WHERE ");
        let mut clause = qb.separated(" AND ");
        for filter in &self.filters {
            match filter {
                Filter::Equals(field, value) => {
                    clause.push(field.column());
                    clause.push_unseparated(" = ");
                    match value {
                        FilterValue::Text(text) => clause.push_bind_unseparated(text.clone()),
                        FilterValue::Int(number) => clause.push_bind_unseparated(*number),
                    };
                }
                Filter::NameContains(term) => {
                    clause.push("name LIKE ");
                    clause.push_bind_unseparated(like_pattern(term));
                    clause.push_unseparated(" ESCAPE '\\'");
                }
            }
        }
    }

    /// Appends ` ORDER BY ...`. Explicit fields fully override the default
    /// `id DESC`; `id ASC` is kept as the final tiebreak so equal keys come
    /// back in insertion order.
    pub fn push_order(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" ORDER BY ");
        if self.order.is_empty() {
            qb.push("id DESC");
            return;
        }
        for (i, (field, direction)) in self.order.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(field.column());
            qb.push(" ");
            qb.push(direction.sql());
        }
        qb.push(", id ASC");
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_object(raw: &str, param: &str) -> AppResult<serde_json::Map<String, Value>> {
    serde_json::from_str(raw)
        .map_err(|_| AppError::BadRequest(format!("The {} parameter must be a JSON object.", param)))
}

fn parse_field(name: &str) -> AppResult<CommentField> {
    CommentField::parse(name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown comment field `{}`.", name)))
}

fn parse_value(field: &str, value: Value) -> AppResult<FilterValue> {
    match value {
        Value::String(text) => Ok(FilterValue::Text(text)),
        Value::Number(number) => number.as_i64().map(FilterValue::Int).ok_or_else(|| {
            AppError::BadRequest(format!("Constraint `{}` must be an integer.", field))
        }),
        _ => Err(AppError::BadRequest(format!(
            "Constraint `{}` must be a string or integer.",
            field
        ))),
    }
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> PageDefaults {
        PageDefaults {
            per_page: 15,
            max_per_page: 100,
        }
    }

    fn params(constraints: Option<&str>, order_by: Option<&str>) -> ListParams {
        ListParams {
            constraints: constraints.map(String::from),
            order_by: order_by.map(String::from),
            ..ListParams::default()
        }
    }

    #[test]
    fn defaults_without_parameters() {
        let query = CommentQuery::from_params(&ListParams::default(), &pages()).unwrap();
        assert!(query.filters.is_empty());
        assert!(query.order.is_empty());
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 15);
    }

    #[test]
    fn constraints_become_equality_filters() {
        let raw = r#"{"name": "alice", "commentable_id": 7}"#;
        let query = CommentQuery::from_params(&params(Some(raw), None), &pages()).unwrap();
        assert_eq!(query.filters.len(), 2);
        assert!(query.filters.contains(&Filter::Equals(
            CommentField::Name,
            FilterValue::Text("alice".into())
        )));
        assert!(query.filters.contains(&Filter::Equals(
            CommentField::CommentableId,
            FilterValue::Int(7)
        )));
    }

    #[test]
    fn malformed_constraints_are_rejected() {
        let err =
            CommentQuery::from_params(&params(Some("{not json"), None), &pages()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = CommentQuery::from_params(&params(Some(r#"{"body": "x"}"#), None), &pages())
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn non_scalar_constraint_is_rejected() {
        let err = CommentQuery::from_params(&params(Some(r#"{"name": ["a"]}"#), None), &pages())
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn order_by_parses_directions() {
        let query =
            CommentQuery::from_params(&params(None, Some(r#"{"name": "desc"}"#)), &pages())
                .unwrap();
        assert_eq!(
            query.order,
            vec![(CommentField::Name, SortDirection::Desc)]
        );
    }

    #[test]
    fn invalid_direction_is_rejected() {
        let err =
            CommentQuery::from_params(&params(None, Some(r#"{"name": "sideways"}"#)), &pages())
                .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn search_becomes_name_filter() {
        let list = ListParams {
            search: Some("ali".into()),
            ..ListParams::default()
        };
        let query = CommentQuery::from_params(&list, &pages()).unwrap();
        assert_eq!(query.filters, vec![Filter::NameContains("ali".into())]);
    }

    #[test]
    fn per_page_is_clamped() {
        let list = ListParams {
            page: Some(0),
            per_page: Some(10_000),
            ..ListParams::default()
        };
        let query = CommentQuery::from_params(&list, &pages()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 100);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }
}
