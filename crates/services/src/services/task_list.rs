//! Per-session task state: the in-memory list for one signed-in user,
//! date-filtered views, and every mutation operation, kept fresh by the task
//! store's change feed.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{Local, NaiveDate, Utc};
use db::models::task::{CreateTask, Task, TaskPriority, UpdateTask};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock, broadcast::error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    mailer::Mailer,
    streak::{StreakError, StreakService},
    task_store::{TaskStoreError, TaskStoreService},
};

/// Window for coalescing bursts of change notifications before re-fetching;
/// the store may emit one event per field changed.
const REFRESH_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TaskListError {
    #[error("{0}")]
    Validation(String),
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    #[error(transparent)]
    Streak(#[from] StreakError),
}

/// Identity of the signed-in user a container belongs to. Built once at login
/// and discarded at logout; there is no process-wide current user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub email: String,
}

impl SessionContext {
    /// Name shown to accountability partners, falling back to the email.
    pub fn sender_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Container-level task input; a missing date means the selected day.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub stakes: Option<String>,
    #[serde(default)]
    pub shared_with: Option<Vec<String>>,
}

/// What a completion toggle produced, for the UI to announce.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub task: Task,
    /// Stakes text when a staked task was just completed.
    pub stakes_met: Option<String>,
    /// Streak value when it just reached 7, 30, or 100.
    pub milestone: Option<i64>,
    /// Non-fatal problems, currently only mail delivery.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ShareOutcome {
    pub task: Task,
    /// True when the email was already on the share list and nothing changed.
    pub already_shared: bool,
    pub warnings: Vec<String>,
}

pub struct TaskListService {
    session: SessionContext,
    store: TaskStoreService,
    streaks: StreakService,
    mailer: Arc<dyn Mailer>,
    tasks: RwLock<Vec<Task>>,
    selected_date: RwLock<NaiveDate>,
    loading: AtomicBool,
    closed: AtomicBool,
    /// Day each task last had a completion notice sent, so a task re-completed
    /// the same day does not notify partners twice.
    notice_log: Mutex<HashMap<Uuid, NaiveDate>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl TaskListService {
    /// Loads the user's tasks and starts listening for changes. An initial
    /// load failure leaves the list empty; the change feed recovers it.
    pub async fn start(
        session: SessionContext,
        store: TaskStoreService,
        streaks: StreakService,
        mailer: Arc<dyn Mailer>,
    ) -> Arc<Self> {
        // Subscribe before the first load so no change slips between the two.
        let mut changes = store.subscribe();

        let container = Arc::new(Self {
            session,
            store,
            streaks,
            mailer,
            tasks: RwLock::new(Vec::new()),
            selected_date: RwLock::new(Local::now().date_naive()),
            loading: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            notice_log: Mutex::new(HashMap::new()),
            refresh_task: Mutex::new(None),
        });

        if let Err(e) = container.refresh().await {
            warn!(
                user_id = %container.session.user_id,
                error = %e,
                "initial task load failed"
            );
        }

        let handle = tokio::spawn({
            let container = Arc::clone(&container);
            async move {
                loop {
                    match changes.recv().await {
                        Ok(change) if change.user_id == container.session.user_id => {
                            tokio::time::sleep(REFRESH_DEBOUNCE).await;
                            while changes.try_recv().is_ok() {}
                            if container.closed.load(Ordering::SeqCst) {
                                break;
                            }
                            if let Err(e) = container.refresh().await {
                                warn!(
                                    user_id = %container.session.user_id,
                                    error = %e,
                                    "task list refresh failed"
                                );
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "change feed lagged; re-fetching");
                            if container.closed.load(Ordering::SeqCst) {
                                break;
                            }
                            if let Err(e) = container.refresh().await {
                                warn!(
                                    user_id = %container.session.user_id,
                                    error = %e,
                                    "task list refresh failed"
                                );
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
        *container.refresh_task.lock().await = Some(handle);

        info!(user_id = %container.session.user_id, "task container started");
        container
    }

    /// Tears down the subscription. Nothing is applied to the list afterwards,
    /// including fetches already in flight.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.refresh_task.lock().await.take() {
            handle.abort();
        }
        self.tasks.write().await.clear();
        info!(user_id = %self.session.user_id, "task container closed");
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn tasks_for_date(&self, date: NaiveDate) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|task| task.date == date)
            .cloned()
            .collect()
    }

    pub async fn selected_date(&self) -> NaiveDate {
        *self.selected_date.read().await
    }

    pub async fn set_selected_date(&self, date: NaiveDate) {
        *self.selected_date.write().await = date;
    }

    pub async fn tasks_for_selected_date(&self) -> Vec<Task> {
        let date = self.selected_date().await;
        self.tasks_for_date(date).await
    }

    /// Re-fetches the authoritative list; change events carry no payload worth
    /// trusting.
    pub async fn refresh(&self) -> Result<(), TaskListError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.store.list(self.session.user_id).await;
        self.loading.store(false, Ordering::SeqCst);
        let fresh = result?;

        if self.closed.load(Ordering::SeqCst) {
            // The user logged out while the fetch was in flight.
            return Ok(());
        }
        *self.tasks.write().await = fresh;
        Ok(())
    }

    pub async fn add_task(&self, data: NewTask) -> Result<Task, TaskListError> {
        if data.title.trim().is_empty() {
            return Err(TaskListError::Validation(
                "task title cannot be empty".to_string(),
            ));
        }

        let date = match data.date {
            Some(date) => date,
            None => self.selected_date().await,
        };
        let create = CreateTask {
            title: data.title,
            date,
            description: data.description,
            priority: data.priority,
            stakes: data.stakes,
            shared_with: data.shared_with,
        };

        let task = self.store.create(self.session.user_id, create).await?;
        self.tasks.write().await.insert(0, task.clone());
        info!(task_id = %task.id, user_id = %self.session.user_id, "task added");
        Ok(task)
    }

    /// Persists the partial update, then merges it into the cached copy. The
    /// merge is optimistic: the next change-feed refresh reconciles it against
    /// the stored row.
    pub async fn update_task(
        &self,
        task_id: Uuid,
        updates: UpdateTask,
    ) -> Result<Task, TaskListError> {
        self.store
            .update(self.session.user_id, task_id, &updates)
            .await
            .map_err(|e| match e {
                TaskStoreError::TaskNotFound(id) => TaskListError::TaskNotFound(id),
                other => TaskListError::Store(other),
            })?;

        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(TaskListError::TaskNotFound(task_id))?;
        task.apply_update(&updates);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Flips completion. Completing (never un-completing) a task acknowledges
    /// its stakes, advances the streak, and notifies accountability partners;
    /// mail failures are warnings, never rollbacks.
    pub async fn toggle_completion(&self, task_id: Uuid) -> Result<ToggleOutcome, TaskListError> {
        let before = self
            .tasks
            .read()
            .await
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or(TaskListError::TaskNotFound(task_id))?;

        let now_completed = !before.completed;
        let task = self
            .update_task(
                task_id,
                UpdateTask {
                    completed: Some(now_completed),
                    ..Default::default()
                },
            )
            .await?;

        let mut outcome = ToggleOutcome {
            task,
            stakes_met: None,
            milestone: None,
            warnings: Vec::new(),
        };
        if !now_completed {
            return Ok(outcome);
        }

        if let Some(stakes) = &before.stakes {
            info!(task_id = %task_id, "staked task completed");
            outcome.stakes_met = Some(stakes.clone());
        }

        let today = Local::now().date_naive();
        match self
            .streaks
            .record_completion(self.session.user_id, today)
            .await
        {
            Ok(update) => outcome.milestone = update.milestone,
            Err(e) => {
                warn!(user_id = %self.session.user_id, error = %e, "streak update failed");
                outcome
                    .warnings
                    .push("Task completed, but the streak could not be updated".to_string());
            }
        }

        let recipients = before.shared_emails().to_vec();
        if !recipients.is_empty() && self.should_notify(task_id, today).await {
            if let Err(e) = self
                .mailer
                .send_completion_notice(&before.title, self.session.sender_name(), &recipients)
                .await
            {
                warn!(task_id = %task_id, error = %e, "completion notice failed");
                outcome
                    .warnings
                    .push(format!("Task completed, but notifying partners failed: {e}"));
            }
        }

        Ok(outcome)
    }

    /// True at most once per task per day: re-completing after an un-complete
    /// the same day stays silent.
    async fn should_notify(&self, task_id: Uuid, today: NaiveDate) -> bool {
        let mut log = self.notice_log.lock().await;
        if log.get(&task_id) == Some(&today) {
            debug!(task_id = %task_id, "completion notice already sent today");
            return false;
        }
        log.insert(task_id, today);
        true
    }

    /// Removes the task locally no matter what the store reported for the row.
    pub async fn delete_task(&self, task_id: Uuid) -> Result<(), TaskListError> {
        self.store.delete(self.session.user_id, task_id).await?;
        self.tasks.write().await.retain(|task| task.id != task_id);
        info!(task_id = %task_id, user_id = %self.session.user_id, "task deleted");
        Ok(())
    }

    pub async fn add_stakes(&self, task_id: Uuid, stakes: &str) -> Result<Task, TaskListError> {
        let stakes = stakes.trim();
        if stakes.is_empty() {
            return Err(TaskListError::Validation(
                "stakes cannot be empty".to_string(),
            ));
        }
        self.update_task(
            task_id,
            UpdateTask {
                stakes: Some(Some(stakes.to_string())),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn remove_stakes(&self, task_id: Uuid) -> Result<Task, TaskListError> {
        self.update_task(
            task_id,
            UpdateTask {
                stakes: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Adds an accountability partner and emails them an invitation. Sharing
    /// with an email already on the list is an idempotent no-op. The share is
    /// persisted before the invitation goes out, so a mail failure leaves the
    /// task shared.
    pub async fn share_task(&self, task_id: Uuid, email: &str) -> Result<ShareOutcome, TaskListError> {
        let email = email.trim();
        if !utils::email::is_valid_email(email) {
            return Err(TaskListError::Validation(format!(
                "invalid email address: {email}"
            )));
        }

        let task = self
            .tasks
            .read()
            .await
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or(TaskListError::TaskNotFound(task_id))?;

        if task.is_shared_with(email) {
            info!(task_id = %task_id, "task already shared with this email");
            return Ok(ShareOutcome {
                task,
                already_shared: true,
                warnings: Vec::new(),
            });
        }

        let mut emails = task.shared_emails().to_vec();
        emails.push(email.to_string());
        let task = self
            .update_task(
                task_id,
                UpdateTask {
                    shared_with: Some(Some(emails)),
                    ..Default::default()
                },
            )
            .await?;

        let mut warnings = Vec::new();
        if let Err(e) = self
            .mailer
            .send_share_invitation(
                task_id,
                &task.title,
                email,
                self.session.sender_name(),
                &self.session.email,
            )
            .await
        {
            warn!(task_id = %task_id, recipient = %email, error = %e, "share invitation failed");
            warnings.push(format!("Task shared, but the invitation email failed: {e}"));
        }

        Ok(ShareOutcome {
            task,
            already_shared: false,
            warnings,
        })
    }

    /// Removes an accountability partner; removing the last one stores the
    /// share list as absent. Unknown emails are an idempotent no-op.
    pub async fn unshare_task(&self, task_id: Uuid, email: &str) -> Result<Task, TaskListError> {
        let task = self
            .tasks
            .read()
            .await
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or(TaskListError::TaskNotFound(task_id))?;

        if !task.is_shared_with(email) {
            return Ok(task);
        }

        let emails: Vec<String> = task
            .shared_emails()
            .iter()
            .filter(|e| e.as_str() != email)
            .cloned()
            .collect();
        self.update_task(
            task_id,
            UpdateTask {
                shared_with: Some((!emails.is_empty()).then_some(emails)),
                ..Default::default()
            },
        )
        .await
    }
}
