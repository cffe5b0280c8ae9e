use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// One `{date, streak}` point in a user's recent completion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct StreakEntry {
    pub date: NaiveDate,
    pub streak: i64,
}

/// Per-user daily completion momentum. Created lazily on first use.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UserStreak {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_completed_date: Option<NaiveDate>,
    /// Most recent completions, oldest first, capped by the streak engine.
    #[ts(type = "Array<{ date: string, streak: number }>")]
    pub streak_history: Json<Vec<StreakEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement state written back after a streak advance.
#[derive(Debug, Clone)]
pub struct UpsertUserStreak {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_completed_date: Option<NaiveDate>,
    pub streak_history: Vec<StreakEntry>,
}

impl UserStreak {
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserStreak>(
            r#"SELECT id, user_id, current_streak, longest_streak, last_completed_date, streak_history, created_at, updated_at
               FROM user_streaks
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns the user's record, inserting a zeroed one if none exists yet.
    pub async fn get_or_create(pool: &SqlitePool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query("INSERT INTO user_streaks (id, user_id) VALUES ($1, $2) ON CONFLICT(user_id) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(user_id)
            .execute(pool)
            .await?;

        Self::find_by_user_id(pool, user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn upsert(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &UpsertUserStreak,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserStreak>(
            r#"INSERT INTO user_streaks (id, user_id, current_streak, longest_streak, last_completed_date, streak_history)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT(user_id) DO UPDATE SET
                   current_streak = excluded.current_streak,
                   longest_streak = excluded.longest_streak,
                   last_completed_date = excluded.last_completed_date,
                   streak_history = excluded.streak_history,
                   updated_at = CURRENT_TIMESTAMP
               RETURNING id, user_id, current_streak, longest_streak, last_completed_date, streak_history, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data.current_streak)
        .bind(data.longest_streak)
        .bind(data.last_completed_date)
        .bind(Json(data.streak_history.clone()))
        .fetch_one(pool)
        .await
    }
}
