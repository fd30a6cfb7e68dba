use crate::db::model::TaskPatch;
use crate::model::{PendingTask, TaskStatus};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

const LAST_SYNC_KEY: &str = "lastSyncTime";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs and non-sqlite schemes pass
/// through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// New task id: capture-time millis plus a random suffix so two captures in
/// the same millisecond cannot collide.
fn new_task_id(created_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        created_at.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

fn task_from_row(row: &SqliteRow) -> Result<PendingTask> {
    let status_str: String = row.get("status");
    let status = TaskStatus::parse_status(&status_str)
        .ok_or_else(|| anyhow!("task has unknown status {}", status_str))?;
    Ok(PendingTask {
        id: row.get("id"),
        created_at: row.get("created_at"),
        payload_name: row.get("payload_name"),
        payload_data: row.get("payload_data"),
        status,
        retry_count: row.get("retry_count"),
    })
}

#[instrument(skip_all)]
pub async fn enqueue_task(pool: &Pool, payload_name: &str, payload_data: &str) -> Result<String> {
    let created_at = Utc::now();
    let id = new_task_id(created_at);
    sqlx::query(
        "INSERT INTO tasks (id, created_at, payload_name, payload_data, status, retry_count) \
         VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(&id)
    .bind(created_at)
    .bind(payload_name)
    .bind(payload_data)
    .bind(TaskStatus::Pending.as_str())
    .execute(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn list_all_tasks(pool: &Pool) -> Result<Vec<PendingTask>> {
    let rows = sqlx::query(
        "SELECT id, created_at, payload_name, payload_data, status, retry_count \
         FROM tasks ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(task_from_row).collect()
}

#[instrument(skip_all)]
pub async fn list_pending_tasks(pool: &Pool) -> Result<Vec<PendingTask>> {
    let rows = sqlx::query(
        "SELECT id, created_at, payload_name, payload_data, status, retry_count \
         FROM tasks WHERE status = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(TaskStatus::Pending.as_str())
    .fetch_all(pool)
    .await?;
    rows.iter().map(task_from_row).collect()
}

#[instrument(skip_all)]
pub async fn update_task(pool: &Pool, id: &str, patch: TaskPatch) -> Result<()> {
    let result = sqlx::query(
        "UPDATE tasks SET status = COALESCE(?, status), \
         retry_count = COALESCE(?, retry_count) WHERE id = ?",
    )
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.retry_count)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(anyhow!("task {} not found", id));
    }
    Ok(())
}

/// Idempotent: deleting an unknown id is not an error.
#[instrument(skip_all)]
pub async fn delete_task(pool: &Pool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn purge_done(pool: &Pool) -> Result<()> {
    sqlx::query("DELETE FROM tasks WHERE status = ?")
        .bind(TaskStatus::Done.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Manual clear of permanently failed tasks. Returns how many were removed.
#[instrument(skip_all)]
pub async fn clear_failed(pool: &Pool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE status = ?")
        .bind(TaskStatus::Failed.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_pending(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = ?")
        .bind(TaskStatus::Pending.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_failed(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = ?")
        .bind(TaskStatus::Failed.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn get_last_sync_at(pool: &Pool) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?")
        .bind(LAST_SYNC_KEY)
        .fetch_optional(pool)
        .await?;
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&value)
        .map_err(|err| anyhow!("stored {} is not RFC3339: {}", LAST_SYNC_KEY, err))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

#[instrument(skip_all)]
pub async fn set_last_sync_at(pool: &Pool, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO sync_meta (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(LAST_SYNC_KEY)
    .bind(at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn enqueue_assigns_unique_pending_tasks() {
        let pool = setup_pool().await;
        let id1 = enqueue_task(&pool, "a.jpg", "data:image/jpeg;base64,QQ==")
            .await
            .unwrap();
        let id2 = enqueue_task(&pool, "b.jpg", "data:image/jpeg;base64,Qg==")
            .await
            .unwrap();
        assert_ne!(id1, id2);

        let all = list_all_tasks(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all
            .iter()
            .all(|t| t.status == TaskStatus::Pending && t.retry_count == 0));
    }

    #[tokio::test]
    async fn pending_filter_excludes_other_statuses() {
        let pool = setup_pool().await;
        let id1 = enqueue_task(&pool, "a.jpg", "data:a").await.unwrap();
        let id2 = enqueue_task(&pool, "b.jpg", "data:b").await.unwrap();
        let _id3 = enqueue_task(&pool, "c.jpg", "data:c").await.unwrap();

        update_task(&pool, &id1, TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();
        update_task(&pool, &id2, TaskPatch::status(TaskStatus::Failed))
            .await
            .unwrap();

        let pending = list_pending_tasks(&pool).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload_name, "c.jpg");

        assert_eq!(list_all_tasks(&pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let pool = setup_pool().await;
        let id = enqueue_task(&pool, "a.jpg", "data:a").await.unwrap();

        update_task(&pool, &id, TaskPatch::default().with_retry_count(2))
            .await
            .unwrap();
        let task = &list_all_tasks(&pool).await.unwrap()[0];
        assert_eq!(task.retry_count, 2);
        assert_eq!(task.status, TaskStatus::Pending);

        update_task(&pool, &id, TaskPatch::status(TaskStatus::InFlight))
            .await
            .unwrap();
        let task = &list_all_tasks(&pool).await.unwrap()[0];
        assert_eq!(task.retry_count, 2);
        assert_eq!(task.status, TaskStatus::InFlight);
    }

    #[tokio::test]
    async fn update_unknown_id_fails() {
        let pool = setup_pool().await;
        let err = update_task(&pool, "missing", TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let pool = setup_pool().await;
        let id = enqueue_task(&pool, "a.jpg", "data:a").await.unwrap();

        delete_task(&pool, &id).await.unwrap();
        delete_task(&pool, &id).await.unwrap();
        delete_task(&pool, "never-existed").await.unwrap();

        assert!(list_all_tasks(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_done_removes_only_done() {
        let pool = setup_pool().await;
        let id1 = enqueue_task(&pool, "a.jpg", "data:a").await.unwrap();
        let _id2 = enqueue_task(&pool, "b.jpg", "data:b").await.unwrap();
        update_task(&pool, &id1, TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();

        purge_done(&pool).await.unwrap();

        let all = list_all_tasks(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload_name, "b.jpg");
    }

    #[tokio::test]
    async fn clear_failed_reports_removed_count() {
        let pool = setup_pool().await;
        let id1 = enqueue_task(&pool, "a.jpg", "data:a").await.unwrap();
        let id2 = enqueue_task(&pool, "b.jpg", "data:b").await.unwrap();
        let _id3 = enqueue_task(&pool, "c.jpg", "data:c").await.unwrap();
        for id in [&id1, &id2] {
            update_task(&pool, id, TaskPatch::status(TaskStatus::Failed))
                .await
                .unwrap();
        }

        assert_eq!(count_failed(&pool).await.unwrap(), 2);
        assert_eq!(clear_failed(&pool).await.unwrap(), 2);
        assert_eq!(count_failed(&pool).await.unwrap(), 0);
        assert_eq!(count_pending(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn last_sync_at_upserts() {
        let pool = setup_pool().await;
        assert!(get_last_sync_at(&pool).await.unwrap().is_none());

        let first = Utc::now();
        set_last_sync_at(&pool, first).await.unwrap();
        let stored = get_last_sync_at(&pool).await.unwrap().unwrap();
        assert_eq!(stored.timestamp_millis(), first.timestamp_millis());

        let later = first + chrono::Duration::seconds(90);
        set_last_sync_at(&pool, later).await.unwrap();
        let stored = get_last_sync_at(&pool).await.unwrap().unwrap();
        assert_eq!(stored.timestamp_millis(), later.timestamp_millis());
    }

    #[test]
    fn sqlite_url_passthrough_for_memory() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://x/y"),
            "postgres://x/y"
        );
    }
}
