//! Project model and store operations.
//!
//! Listing order is a contract, not a cosmetic detail: in-progress work
//! surfaces first, then queued, then completed, and within each group the
//! most recent effective date (completion date for finished work, creation
//! date otherwise) comes first. The ordering is expressed in SQL so every
//! caller gets the same sequence.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::media::DEFAULT_IMAGE;
use crate::DbPool;

pub const STATUS_IN_PROGRESS: &str = "制作中";
pub const STATUS_QUEUED: &str = "排队中";
pub const STATUS_COMPLETED: &str = "已完成";

const LIST_ORDER: &str = "
    ORDER BY
        CASE status
            WHEN '制作中' THEN 0
            WHEN '排队中' THEN 1
            WHEN '已完成' THEN 2
            ELSE 3
        END,
        CASE
            WHEN status = '已完成' AND completed_at IS NOT NULL THEN completed_at
            ELSE created_at
        END DESC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    /// None until the first save assigns a row id.
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub image_path: String,
    pub thumbnail_path: String,
    pub created_at: String,
    /// `YYYY-MM-DD`, set only while status is 已完成.
    pub completed_at: Option<String>,
}

impl Project {
    pub fn new(title: &str, description: Option<&str>, category: &str, status: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            description: description.map(str::to_string),
            category: category.to_string(),
            status: status.to_string(),
            image_path: DEFAULT_IMAGE.to_string(),
            thumbnail_path: DEFAULT_IMAGE.to_string(),
            created_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            completed_at: None,
        }
    }

    /// All projects, optionally filtered to one category, in listing order.
    /// An unknown category yields an empty list.
    pub async fn list(pool: &DbPool, category: Option<&str>) -> Result<Vec<Project>> {
        let projects = match category {
            Some(category) => {
                let sql = format!("SELECT * FROM projects WHERE category = ?{LIST_ORDER}");
                sqlx::query_as(&sql).bind(category).fetch_all(pool).await?
            }
            None => {
                let sql = format!("SELECT * FROM projects{LIST_ORDER}");
                sqlx::query_as(&sql).fetch_all(pool).await?
            }
        };
        Ok(projects)
    }

    pub async fn get(pool: &DbPool, id: i64) -> Result<Option<Project>> {
        let project = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(project)
    }

    /// Insert when no id has been assigned yet, update otherwise.
    /// `created_at` is written once on insert and never touched on update.
    pub async fn save(&mut self, pool: &DbPool) -> Result<()> {
        match self.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE projects
                     SET title = ?, description = ?, category = ?, status = ?,
                         image_path = ?, thumbnail_path = ?, completed_at = ?
                     WHERE id = ?",
                )
                .bind(&self.title)
                .bind(&self.description)
                .bind(&self.category)
                .bind(&self.status)
                .bind(&self.image_path)
                .bind(&self.thumbnail_path)
                .bind(&self.completed_at)
                .bind(id)
                .execute(pool)
                .await?;
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO projects
                         (title, description, category, status, image_path,
                          thumbnail_path, created_at, completed_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&self.title)
                .bind(&self.description)
                .bind(&self.category)
                .bind(&self.status)
                .bind(&self.image_path)
                .bind(&self.thumbnail_path)
                .bind(&self.created_at)
                .bind(&self.completed_at)
                .execute(pool)
                .await?;
                self.id = Some(result.last_insert_rowid());
            }
        }
        Ok(())
    }

    /// Remove the row. Deleting an id that does not exist is a no-op.
    /// Associated image files are the caller's concern, so record deletion
    /// never depends on filesystem state.
    pub async fn delete(pool: &DbPool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn edit_url(&self) -> String {
        format!("/edit_project/{}", self.id.unwrap_or_default())
    }

    pub fn delete_url(&self) -> String {
        format!("/delete_project/{}", self.id.unwrap_or_default())
    }

    /// Completion date for display, e.g. "2024年03月01日"; `---` when unset
    /// or unparseable.
    pub fn format_completed_date(&self) -> String {
        self.completed_at
            .as_deref()
            .and_then(parse_date)
            .map(|d| d.format("%Y年%m月%d日").to_string())
            .unwrap_or_else(|| "---".to_string())
    }

    /// Completion date as `YYYY-MM-DD` for `<input type="date">`; empty when
    /// unset.
    pub fn completed_date_for_input(&self) -> String {
        self.completed_at
            .as_deref()
            .and_then(parse_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Normalize a submitted completion date before save. Returns the value to
/// store and whether the input was present but invalid (the caller surfaces
/// that as a warning; the save still proceeds).
///
/// The date is kept only when the status is 已完成; any other status clears
/// it, which maintains the store invariant.
pub fn normalize_completed_at(status: &str, input: Option<&str>) -> (Option<String>, bool) {
    if status != STATUS_COMPLETED {
        return (None, false);
    }
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return (None, false);
    };
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => (Some(date.format("%Y-%m-%d").to_string()), false),
        Err(_) => (None, true),
    }
}

/// Stored timestamps come in two shapes: `YYYY-MM-DD HH:MM:SS` (SQLite
/// CURRENT_TIMESTAMP) and bare `YYYY-MM-DD` dates.
fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .ok()
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn insert(
        pool: &DbPool,
        title: &str,
        category: &str,
        status: &str,
        created_at: &str,
        completed_at: Option<&str>,
    ) -> Project {
        let mut project = Project::new(title, None, category, status);
        project.created_at = created_at.to_string();
        project.completed_at = completed_at.map(str::to_string);
        project.save(pool).await.unwrap();
        project
    }

    fn status_rank(status: &str) -> u8 {
        match status {
            STATUS_IN_PROGRESS => 0,
            STATUS_QUEUED => 1,
            STATUS_COMPLETED => 2,
            _ => 3,
        }
    }

    fn effective_date(p: &Project) -> String {
        match (&p.status, &p.completed_at) {
            (s, Some(d)) if s == STATUS_COMPLETED => d.clone(),
            _ => p.created_at.clone(),
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let pool = test_pool().await;
        let mut project = Project::new("围巾", Some("羊毛围巾"), "knitting", STATUS_QUEUED);
        project.save(&pool).await.unwrap();

        let fetched = Project::get(&pool, project.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(fetched, project);
    }

    #[tokio::test]
    async fn listing_orders_by_status_then_effective_date() {
        let pool = test_pool().await;
        insert(&pool, "a", "knitting", STATUS_COMPLETED, "2024-01-05 10:00:00", Some("2024-03-01")).await;
        insert(&pool, "b", "knitting", STATUS_QUEUED, "2024-02-01 10:00:00", None).await;
        insert(&pool, "c", "knitting", STATUS_IN_PROGRESS, "2024-01-01 10:00:00", None).await;
        insert(&pool, "d", "knitting", STATUS_COMPLETED, "2024-04-01 10:00:00", None).await;
        insert(&pool, "e", "knitting", STATUS_QUEUED, "2024-03-01 10:00:00", None).await;
        insert(&pool, "f", "knitting", "搁置中", "2024-05-01 10:00:00", None).await;

        let listed = Project::list(&pool, None).await.unwrap();
        assert_eq!(listed.len(), 6);

        let ranks: Vec<u8> = listed.iter().map(|p| status_rank(&p.status)).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted, "status groups out of order");

        for pair in listed.windows(2) {
            if status_rank(&pair[0].status) == status_rank(&pair[1].status) {
                assert!(
                    effective_date(&pair[0]) >= effective_date(&pair[1]),
                    "effective dates increase within a status group"
                );
            }
        }

        // In-progress first, unknown status last
        assert_eq!(listed[0].title, "c");
        assert_eq!(listed[5].title, "f");
        // Queued: most recent created_at first
        assert_eq!(listed[1].title, "e");
        assert_eq!(listed[2].title, "b");
    }

    #[tokio::test]
    async fn category_filter_is_exact_and_unknown_is_empty() {
        let pool = test_pool().await;
        insert(&pool, "a", "knitting", STATUS_QUEUED, "2024-01-01 10:00:00", None).await;
        insert(&pool, "b", "crafting", STATUS_QUEUED, "2024-01-02 10:00:00", None).await;

        let knitting = Project::list(&pool, Some("knitting")).await.unwrap();
        assert_eq!(knitting.len(), 1);
        assert_eq!(knitting[0].title, "a");

        let unknown = Project::list(&pool, Some("pottery")).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_id_is_noop() {
        let pool = test_pool().await;
        Project::delete(&pool, 999).await.unwrap();
        assert!(Project::get(&pool, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_all_mutable_fields() {
        let pool = test_pool().await;
        let mut project = insert(&pool, "围巾", "knitting", STATUS_QUEUED, "2024-01-01 10:00:00", None).await;

        project.title = "毛线帽".to_string();
        project.status = STATUS_COMPLETED.to_string();
        project.completed_at = Some("2024-03-01".to_string());
        project.save(&pool).await.unwrap();

        let fetched = Project::get(&pool, project.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(fetched.title, "毛线帽");
        assert_eq!(fetched.completed_at.as_deref(), Some("2024-03-01"));
        // created_at never changes on update
        assert_eq!(fetched.created_at, "2024-01-01 10:00:00");
    }

    #[test]
    fn normalization_clears_date_for_non_completed_status() {
        let (value, warn) = normalize_completed_at(STATUS_QUEUED, Some("2024-03-01"));
        assert_eq!(value, None);
        assert!(!warn);
    }

    #[test]
    fn normalization_drops_invalid_date_with_warning() {
        let (value, warn) = normalize_completed_at(STATUS_COMPLETED, Some("03/01/2024"));
        assert_eq!(value, None);
        assert!(warn);

        let (value, warn) = normalize_completed_at(STATUS_COMPLETED, Some("2024-13-40"));
        assert_eq!(value, None);
        assert!(warn);
    }

    #[test]
    fn normalization_keeps_valid_date() {
        let (value, warn) = normalize_completed_at(STATUS_COMPLETED, Some("2024-03-01"));
        assert_eq!(value.as_deref(), Some("2024-03-01"));
        assert!(!warn);

        let (value, warn) = normalize_completed_at(STATUS_COMPLETED, Some("  "));
        assert_eq!(value, None);
        assert!(!warn);
    }

    #[test]
    fn completed_date_formatting() {
        let mut project = Project::new("围巾", None, "knitting", STATUS_COMPLETED);
        project.completed_at = Some("2024-03-01".to_string());
        assert_eq!(project.format_completed_date(), "2024年03月01日");
        assert_eq!(project.completed_date_for_input(), "2024-03-01");

        project.completed_at = Some("2024-03-01 15:04:05".to_string());
        assert_eq!(project.format_completed_date(), "2024年03月01日");

        project.completed_at = None;
        assert_eq!(project.format_completed_date(), "---");
        assert_eq!(project.completed_date_for_input(), "");
    }

    #[tokio::test]
    async fn dashboard_and_archive_membership_scenario() {
        let pool = test_pool().await;
        let mut scarf = Project::new("Scarf", None, "knitting", STATUS_QUEUED);
        scarf.save(&pool).await.unwrap();

        // Active dashboard shows it, completed archive does not
        let active: Vec<Project> = Project::list(&pool, Some("knitting"))
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status != STATUS_COMPLETED)
            .collect();
        assert!(active.iter().any(|p| p.title == "Scarf"));

        let completed: Vec<Project> = Project::list(&pool, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status.trim() == STATUS_COMPLETED)
            .collect();
        assert!(completed.is_empty());

        // Completing it moves it to the archive with a formatted date
        scarf.status = STATUS_COMPLETED.to_string();
        let (completed_at, warn) = normalize_completed_at(&scarf.status, Some("2024-03-01"));
        assert!(!warn);
        scarf.completed_at = completed_at;
        scarf.save(&pool).await.unwrap();

        let active: Vec<Project> = Project::list(&pool, Some("knitting"))
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status != STATUS_COMPLETED)
            .collect();
        assert!(active.is_empty());

        let completed: Vec<Project> = Project::list(&pool, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status.trim() == STATUS_COMPLETED)
            .collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].format_completed_date(), "2024年03月01日");
    }
}
