//! Gateway between task state containers and the task rows, with a push-based
//! change feed: every mutation publishes an event naming the affected owner,
//! and subscribers re-fetch rather than trusting payloads.

use db::{
    DBService,
    models::task::{CreateTask, Task, UpdateTask},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Change feed capacity; a lagging subscriber just re-fetches.
const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
}

/// A row changed for this owner. Carries no row data on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskChange {
    pub user_id: Uuid,
}

#[derive(Clone)]
pub struct TaskStoreService {
    db: DBService,
    changes: broadcast::Sender<TaskChange>,
}

impl TaskStoreService {
    pub fn new(db: DBService) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { db, changes }
    }

    /// All of the owner's tasks, newest-created-first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Task>, TaskStoreError> {
        Ok(Task::find_by_user_id(&self.db.pool, user_id).await?)
    }

    pub async fn find(&self, task_id: Uuid) -> Result<Option<Task>, TaskStoreError> {
        Ok(Task::find_by_id(&self.db.pool, task_id).await?)
    }

    /// Inserts a task for the owner and returns the stored row.
    pub async fn create(&self, user_id: Uuid, data: CreateTask) -> Result<Task, TaskStoreError> {
        let data = data.normalized();
        let task = Task::create(&self.db.pool, user_id, &data, Uuid::new_v4()).await?;
        debug!(task_id = %task.id, user_id = %user_id, "task row created");
        self.publish(user_id);
        Ok(task)
    }

    /// Applies only the fields present in `data` to the task.
    pub async fn update(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        data: &UpdateTask,
    ) -> Result<(), TaskStoreError> {
        let affected = Task::update(&self.db.pool, task_id, data).await?;
        if affected == 0 {
            return Err(TaskStoreError::TaskNotFound(task_id));
        }
        self.publish(user_id);
        Ok(())
    }

    /// Deletes the task. Deleting an id that no longer exists is a success.
    pub async fn delete(&self, user_id: Uuid, task_id: Uuid) -> Result<(), TaskStoreError> {
        let affected = Task::delete(&self.db.pool, task_id).await?;
        if affected == 0 {
            debug!(task_id = %task_id, "delete of missing task treated as success");
        }
        self.publish(user_id);
        Ok(())
    }

    /// Change events for every owner's rows; receivers filter by owner id.
    /// Dropping the receiver stops delivery.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskChange> {
        self.changes.subscribe()
    }

    fn publish(&self, user_id: Uuid) {
        // No subscribers is not an error.
        let _ = self.changes.send(TaskChange { user_id });
    }
}
