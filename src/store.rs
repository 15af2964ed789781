// Comment store - SQLite persistence for comments and the per-entity
// comment-count aggregate. All SQL lives here; dynamic clauses come from the
// typed CommentQuery and every value is a bind parameter.

use anyhow::Result;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqliteConnection,
};
use std::str::FromStr;

use crate::models::Comment;
use crate::query::CommentQuery;

/// Validated insert payload; defaults are already applied by the service.
#[derive(Debug, Clone)]
pub struct NewCommentRecord {
    pub commentable_type: String,
    pub commentable_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub content: String,
    pub status: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
    pub commentable_type: Option<String>,
    pub commentable_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
}

pub struct CommentStore {
    pool: SqlitePool,
}

impl CommentStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database. Each SQLite `:memory:`
    /// connection is its own database, so the pool must not grow.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                commentable_type TEXT NOT NULL,
                commentable_id INTEGER NOT NULL,
                parent_id INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                email TEXT,
                content TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comment_counts (
                commentable_type TEXT NOT NULL,
                commentable_id INTEGER NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (commentable_type, commentable_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_commentable
             ON comments(commentable_type, commentable_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_status ON comments(status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inserts the comment and bumps the aggregate for its commentable key
    /// in one transaction, so a failure leaves neither row behind.
    pub async fn insert_comment(&self, record: &NewCommentRecord) -> Result<Comment> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO comments
                (commentable_type, commentable_id, parent_id, name, email, content, status,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.commentable_type)
        .bind(record.commentable_id)
        .bind(record.parent_id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.content)
        .bind(&record.status)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        Self::bump_count(&mut *tx, &record.commentable_type, record.commentable_id).await?;

        tx.commit().await?;

        Ok(Comment {
            id,
            commentable_type: record.commentable_type.clone(),
            commentable_id: record.commentable_id,
            parent_id: record.parent_id,
            name: record.name.clone(),
            email: record.email.clone(),
            content: record.content.clone(),
            status: record.status.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Atomic upsert-increment. Concurrent creations for the same key both
    /// land: the increment happens inside the database, not read-modify-write
    /// in application code.
    async fn bump_count(
        conn: &mut SqliteConnection,
        commentable_type: &str,
        commentable_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO comment_counts (commentable_type, commentable_id, count)
             VALUES (?, ?, 1)
             ON CONFLICT(commentable_type, commentable_id)
             DO UPDATE SET count = count + 1",
        )
        .bind(commentable_type)
        .bind(commentable_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, commentable_type, commentable_id, parent_id, name, email, content,
                    status, created_at, updated_at
             FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Self::row_to_comment(&row)))
    }

    /// Runs the typed query twice: once for the total across all pages, once
    /// for the requested page.
    pub async fn list_comments(&self, query: &CommentQuery) -> Result<(Vec<Comment>, i64)> {
        let mut count_builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM comments");
        query.push_filters(&mut count_builder);
        let total: i64 = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, commentable_type, commentable_id, parent_id, name, email, content,
                    status, created_at, updated_at
             FROM comments",
        );
        query.push_filters(&mut builder);
        query.push_order(&mut builder);
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(query.per_page));
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let comments = rows.iter().map(Self::row_to_comment).collect();

        Ok((comments, total))
    }

    pub async fn update_comment(&self, id: i64, patch: &CommentPatch) -> Result<bool> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE comments SET ");
        {
            let mut assignments = builder.separated(", ");
            if let Some(value) = &patch.commentable_type {
                assignments.push("commentable_type = ");
                assignments.push_bind_unseparated(value.clone());
            }
            if let Some(value) = patch.commentable_id {
                assignments.push("commentable_id = ");
                assignments.push_bind_unseparated(value);
            }
            if let Some(value) = patch.parent_id {
                assignments.push("parent_id = ");
                assignments.push_bind_unseparated(value);
            }
            if let Some(value) = &patch.name {
                assignments.push("name = ");
                assignments.push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.email {
                assignments.push("email = ");
                assignments.push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.content {
                assignments.push("content = ");
                assignments.push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.status {
                assignments.push("status = ");
                assignments.push_bind_unseparated(value.clone());
            }
            assignments.push("updated_at = ");
            assignments.push_bind_unseparated(Utc::now());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the row only. The comment_counts aggregate is a total of
    /// comments ever created and is not decremented.
    pub async fn delete_comment(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_status(&self, id: i64, status: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE comments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids with no matching row are skipped; returns how many rows changed.
    pub async fn set_status_bulk(&self, ids: &[i64], status: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE comments SET status = ");
        builder.push_bind(status.to_string());
        builder.push(", updated_at = ");
        builder.push_bind(Utc::now());
        builder.push(" WHERE id IN (");
        {
            let mut id_list = builder.separated(", ");
            for id in ids {
                id_list.push_bind(*id);
            }
        }
        builder.push(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for(&self, commentable_type: &str, commentable_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT count FROM comment_counts WHERE commentable_type = ? AND commentable_id = ?",
        )
        .bind(commentable_type)
        .bind(commentable_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("count")).unwrap_or(0))
    }

    fn row_to_comment(row: &SqliteRow) -> Comment {
        Comment {
            id: row.get("id"),
            commentable_type: row.get("commentable_type"),
            commentable_id: row.get("commentable_id"),
            parent_id: row.get("parent_id"),
            name: row.get("name"),
            email: row.get("email"),
            content: row.get("content"),
            status: row.get("status"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STATUS_ACTIVE;

    fn record(commentable_id: i64, name: &str) -> NewCommentRecord {
        NewCommentRecord {
            commentable_type: "post".to_string(),
            commentable_id,
            parent_id: 0,
            name: name.to_string(),
            email: Some(format!("{name}@example.com")),
            content: "some comment text".to_string(),
            status: STATUS_ACTIVE.to_string(),
        }
    }

    async fn store() -> CommentStore {
        let store = CommentStore::in_memory().await.unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn count_upserts_per_commentable_key() {
        let store = store().await;
        store.insert_comment(&record(1, "alice")).await.unwrap();
        store.insert_comment(&record(1, "bob")).await.unwrap();
        store.insert_comment(&record(2, "carol")).await.unwrap();

        assert_eq!(store.count_for("post", 1).await.unwrap(), 2);
        assert_eq!(store.count_for("post", 2).await.unwrap(), 1);
        assert_eq!(store.count_for("product", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_keeps_the_aggregate() {
        let store = store().await;
        let comment = store.insert_comment(&record(1, "alice")).await.unwrap();
        assert!(store.delete_comment(comment.id).await.unwrap());
        assert!(store.get_comment(comment.id).await.unwrap().is_none());
        assert_eq!(store.count_for("post", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn patch_updates_only_provided_fields() {
        let store = store().await;
        let comment = store.insert_comment(&record(1, "alice")).await.unwrap();

        let patch = CommentPatch {
            content: Some("edited".to_string()),
            ..CommentPatch::default()
        };
        assert!(store.update_comment(comment.id, &patch).await.unwrap());

        let reloaded = store.get_comment(comment.id).await.unwrap().unwrap();
        assert_eq!(reloaded.content, "edited");
        assert_eq!(reloaded.name, "alice");
        assert_eq!(reloaded.status, STATUS_ACTIVE);
    }

    #[tokio::test]
    async fn bulk_status_skips_missing_ids() {
        let store = store().await;
        let first = store.insert_comment(&record(1, "alice")).await.unwrap();
        let second = store.insert_comment(&record(1, "bob")).await.unwrap();

        let changed = store
            .set_status_bulk(&[first.id, second.id, 9999], "hidden")
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let reloaded = store.get_comment(first.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, "hidden");
    }
}
