use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

/// One user-visible to-do item. Columns are snake_case; the UI sees camelCase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub stakes: Option<String>,
    /// Accountability partner emails. Never stored as an empty list: an empty
    /// set round-trips as absent.
    #[ts(type = "Array<string> | null")]
    pub shared_with: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Emails this task is shared with; empty when unshared.
    pub fn shared_emails(&self) -> &[String] {
        self.shared_with
            .as_ref()
            .map(|emails| emails.0.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_shared_with(&self, email: &str) -> bool {
        self.shared_emails().iter().any(|e| e == email)
    }

    /// Merges a partial update into this row image.
    pub fn apply_update(&mut self, updates: &UpdateTask) {
        if let Some(title) = &updates.title {
            self.title = title.clone();
        }
        if let Some(completed) = updates.completed {
            self.completed = completed;
        }
        if let Some(date) = updates.date {
            self.date = date;
        }
        if let Some(description) = &updates.description {
            self.description = description.clone();
        }
        if let Some(priority) = updates.priority {
            self.priority = priority;
        }
        if let Some(stakes) = &updates.stakes {
            self.stakes = stakes.clone();
        }
        if let Some(shared_with) = &updates.shared_with {
            self.shared_with = shared_with
                .clone()
                .filter(|emails| !emails.is_empty())
                .map(Json);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub stakes: Option<String>,
    pub shared_with: Option<Vec<String>>,
}

impl CreateTask {
    pub fn from_title_date(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date,
            description: None,
            priority: None,
            stakes: None,
            shared_with: None,
        }
    }

    /// Trims free-text fields and stores empty optionals as absent.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            date: self.date,
            description: normalize_text(self.description),
            priority: self.priority,
            stakes: normalize_text(self.stakes),
            shared_with: normalize_emails(self.shared_with),
        }
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn normalize_emails(value: Option<Vec<String>>) -> Option<Vec<String>> {
    let mut emails: Vec<String> = Vec::new();
    for email in value.into_iter().flatten() {
        let email = email.trim().to_string();
        if !email.is_empty() && !emails.contains(&email) {
            emails.push(email);
        }
    }
    (!emails.is_empty()).then_some(emails)
}

/// Partial update. Absent fields are left untouched; the doubled options on
/// nullable columns distinguish "set" from "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "'high' | 'medium' | 'low' | null")]
    pub priority: Option<Option<TaskPriority>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    pub stakes: Option<Option<String>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "Array<string> | null")]
    pub shared_with: Option<Option<Vec<String>>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.completed.is_none()
            && self.date.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.stakes.is_none()
            && self.shared_with.is_none()
    }
}

impl Task {
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, user_id, title, completed, date, description, priority, stakes, shared_with, created_at, updated_at
               FROM tasks
               WHERE user_id = $1
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, user_id, title, completed, date, description, priority, stakes, shared_with, created_at, updated_at
               FROM tasks
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, user_id, title, completed, date, description, priority, stakes, shared_with)
               VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8)
               RETURNING id, user_id, title, completed, date, description, priority, stakes, shared_with, created_at, updated_at"#,
        )
        .bind(task_id)
        .bind(user_id)
        .bind(&data.title)
        .bind(data.date)
        .bind(data.description.as_deref())
        .bind(data.priority)
        .bind(data.stakes.as_deref())
        .bind(data.shared_with.clone().map(Json))
        .fetch_one(pool)
        .await
    }

    /// Applies only the fields present in `data`. Returns the number of rows
    /// changed: zero means the task does not exist.
    pub async fn update(pool: &SqlitePool, id: Uuid, data: &UpdateTask) -> Result<u64, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE tasks SET updated_at = CURRENT_TIMESTAMP");
        if let Some(title) = &data.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(completed) = data.completed {
            query.push(", completed = ").push_bind(completed);
        }
        if let Some(date) = data.date {
            query.push(", date = ").push_bind(date);
        }
        if let Some(description) = &data.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(priority) = data.priority {
            query.push(", priority = ").push_bind(priority);
        }
        if let Some(stakes) = &data.stakes {
            query.push(", stakes = ").push_bind(stakes.clone());
        }
        if let Some(shared_with) = &data.shared_with {
            let shared_with = shared_with
                .clone()
                .filter(|emails| !emails.is_empty())
                .map(Json);
            query.push(", shared_with = ").push_bind(shared_with);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
