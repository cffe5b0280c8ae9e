//! Streak advancement: increment, hold, or reset a user's daily completion
//! streak, with a bounded per-day history.

use chrono::NaiveDate;
use db::{
    DBService,
    models::user_streak::{StreakEntry, UpsertUserStreak, UserStreak},
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Most recent history entries retained per user.
const HISTORY_LIMIT: usize = 30;

/// Streak values announced to the user when first reached.
pub const MILESTONES: [i64; 3] = [7, 30, 100];

#[derive(Debug, Error)]
pub enum StreakError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Next streak state computed for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakAdvance {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_completed_date: NaiveDate,
    pub streak_history: Vec<StreakEntry>,
}

/// Computes the next streak state for a completion on `today`.
///
/// A second completion the same day holds the streak, a completion the day
/// after the last one extends it, and anything older resets it to 1. A
/// last-completed date in the future also counts as a broken streak. The
/// history gains at most one entry per day and keeps only the newest
/// [`HISTORY_LIMIT`] entries.
pub fn advance(prior: Option<&UserStreak>, today: NaiveDate) -> StreakAdvance {
    let (current_streak, longest_streak, mut streak_history) = match prior {
        None => (1, 1, Vec::new()),
        Some(prior) => {
            let yesterday = utils::date::previous_day(today);
            let current = match prior.last_completed_date {
                Some(last) if last == today => prior.current_streak,
                Some(last) if last == yesterday => prior.current_streak + 1,
                _ => 1,
            };
            (
                current,
                prior.longest_streak.max(current),
                prior.streak_history.0.clone(),
            )
        }
    };

    if streak_history.last().map(|entry| entry.date) != Some(today) {
        streak_history.push(StreakEntry {
            date: today,
            streak: current_streak,
        });
    }
    if streak_history.len() > HISTORY_LIMIT {
        streak_history.drain(..streak_history.len() - HISTORY_LIMIT);
    }

    StreakAdvance {
        current_streak,
        longest_streak,
        last_completed_date: today,
        streak_history,
    }
}

/// True when the streak just changed to a milestone value. Holding at a
/// milestone on a same-day completion stays silent.
fn reached_milestone(prior_streak: Option<i64>, current_streak: i64) -> bool {
    MILESTONES.contains(&current_streak) && prior_streak != Some(current_streak)
}

/// Result of recording a completion: the stored record plus the milestone
/// value when one was just reached (a presentation hint, nothing more).
#[derive(Debug)]
pub struct StreakUpdate {
    pub streak: UserStreak,
    pub milestone: Option<i64>,
}

#[derive(Clone)]
pub struct StreakService {
    db: DBService,
}

impl StreakService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// The user's streak record, lazily created zeroed on first read.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<UserStreak, StreakError> {
        Ok(UserStreak::get_or_create(&self.db.pool, user_id).await?)
    }

    /// Advances and persists the streak for a completion on `today`.
    pub async fn record_completion(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<StreakUpdate, StreakError> {
        let prior = UserStreak::find_by_user_id(&self.db.pool, user_id).await?;
        let next = advance(prior.as_ref(), today);
        let milestone = reached_milestone(
            prior.as_ref().map(|p| p.current_streak),
            next.current_streak,
        )
        .then_some(next.current_streak);

        let streak = UserStreak::upsert(
            &self.db.pool,
            user_id,
            &UpsertUserStreak {
                current_streak: next.current_streak,
                longest_streak: next.longest_streak,
                last_completed_date: Some(next.last_completed_date),
                streak_history: next.streak_history,
            },
        )
        .await?;

        info!(
            user_id = %user_id,
            current_streak = streak.current_streak,
            longest_streak = streak.longest_streak,
            "streak updated"
        );

        Ok(StreakUpdate { streak, milestone })
    }
}
