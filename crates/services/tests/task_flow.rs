//! End-to-end container behavior over an in-memory database with a recording
//! mail dispatcher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use db::{
    DBService,
    models::task::{CreateTask, UpdateTask},
};
use services::services::{
    mailer::{Mailer, NotificationError},
    streak::StreakService,
    task_list::{NewTask, SessionContext, TaskListService},
    task_store::TaskStoreService,
};
use uuid::Uuid;

/// Records every dispatch instead of talking to a mail provider.
#[derive(Default)]
struct RecordingMailer {
    invitations: Mutex<Vec<(Uuid, String)>>,
    notices: Mutex<Vec<(String, Vec<String>)>>,
    fail: bool,
}

impl RecordingMailer {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn invitations(&self) -> Vec<(Uuid, String)> {
        self.invitations.lock().unwrap().clone()
    }

    fn notices(&self) -> Vec<(String, Vec<String>)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_share_invitation(
        &self,
        task_id: Uuid,
        _task_title: &str,
        recipient_email: &str,
        _sender_name: &str,
        _sender_email: &str,
    ) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Transport("mailer down".to_string()));
        }
        self.invitations
            .lock()
            .unwrap()
            .push((task_id, recipient_email.to_string()));
        Ok(())
    }

    async fn send_completion_notice(
        &self,
        task_title: &str,
        _owner_display_name: &str,
        recipient_emails: &[String],
    ) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Transport("mailer down".to_string()));
        }
        self.notices
            .lock()
            .unwrap()
            .push((task_title.to_string(), recipient_emails.to_vec()));
        Ok(())
    }

    async fn send_test(&self, _recipient_email: &str) -> Result<(), NotificationError> {
        Ok(())
    }
}

struct Harness {
    container: Arc<TaskListService>,
    store: TaskStoreService,
    streaks: StreakService,
    mailer: Arc<RecordingMailer>,
    user_id: Uuid,
}

async fn setup_with(mailer: RecordingMailer) -> Harness {
    let db = DBService::new_in_memory().await.unwrap();
    let store = TaskStoreService::new(db.clone());
    let streaks = StreakService::new(db);
    let mailer = Arc::new(mailer);
    let user_id = Uuid::new_v4();
    let session = SessionContext {
        user_id,
        display_name: Some("Alice".to_string()),
        email: "alice@x.com".to_string(),
    };
    let container = TaskListService::start(
        session,
        store.clone(),
        streaks.clone(),
        Arc::clone(&mailer) as Arc<dyn Mailer>,
    )
    .await;
    Harness {
        container,
        store,
        streaks,
        mailer,
        user_id,
    }
}

async fn setup() -> Harness {
    setup_with(RecordingMailer::default()).await
}

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        date: None,
        description: None,
        priority: None,
        stakes: None,
        shared_with: None,
    }
}

#[tokio::test]
async fn added_task_shows_up_only_on_its_date() {
    let h = setup().await;
    let today = h.container.selected_date().await;
    let tomorrow = today + chrono::Duration::days(1);

    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();
    assert!(!task.completed);
    assert_eq!(task.date, today);

    let mut later = new_task("Call mum");
    later.date = Some(tomorrow);
    h.container.add_task(later).await.unwrap();

    let selected = h.container.tasks_for_selected_date().await;
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].title, "Buy milk");

    h.container.set_selected_date(tomorrow).await;
    let selected = h.container.tasks_for_selected_date().await;
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].title, "Call mum");

    // Newest first in the full list.
    let all = h.container.tasks().await;
    assert_eq!(all[0].title, "Call mum");
}

#[tokio::test]
async fn blank_title_is_rejected_before_any_write() {
    let h = setup().await;
    let result = h.container.add_task(new_task("   ")).await;
    assert!(result.is_err());
    assert!(h.store.list(h.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_task_is_gone_from_container_and_store() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();

    h.container.delete_task(task.id).await.unwrap();
    assert!(h.container.tasks().await.is_empty());
    assert!(h.store.list(h.user_id).await.unwrap().is_empty());

    // Deleting an id that no longer exists still succeeds.
    h.container.delete_task(task.id).await.unwrap();
}

#[tokio::test]
async fn partial_update_touches_only_named_fields() {
    let h = setup().await;
    let mut data = new_task("Buy milk");
    data.stakes = Some("no dessert".to_string());
    let task = h.container.add_task(data).await.unwrap();

    let updated = h
        .container
        .update_task(
            task.id,
            UpdateTask {
                description: Some(Some("2 litres".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("2 litres"));
    assert_eq!(updated.stakes.as_deref(), Some("no dessert"));

    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("2 litres"));
    assert_eq!(stored.stakes.as_deref(), Some("no dessert"));
}

#[tokio::test]
async fn stakes_can_be_set_and_cleared() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();

    let task = h
        .container
        .add_stakes(task.id, "  no dessert tonight  ")
        .await
        .unwrap();
    assert_eq!(task.stakes.as_deref(), Some("no dessert tonight"));

    let task = h.container.remove_stakes(task.id).await.unwrap();
    assert!(task.stakes.is_none());
    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert!(stored.stakes.is_none());

    assert!(h.container.add_stakes(task.id, "   ").await.is_err());
}

#[tokio::test]
async fn share_then_unshare_round_trips_to_absent() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();

    let outcome = h.container.share_task(task.id, "a@x.com").await.unwrap();
    assert!(!outcome.already_shared);
    assert!(outcome.warnings.is_empty());
    assert_eq!(h.mailer.invitations(), vec![(task.id, "a@x.com".to_string())]);

    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert_eq!(stored.shared_emails().to_vec(), vec!["a@x.com".to_string()]);

    let task = h.container.unshare_task(task.id, "a@x.com").await.unwrap();
    assert!(task.shared_with.is_none());
    // Absent, not an empty list.
    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert!(stored.shared_with.is_none());
}

#[tokio::test]
async fn unsharing_an_unknown_email_changes_nothing() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();
    h.container.share_task(task.id, "a@x.com").await.unwrap();

    let task = h.container.unshare_task(task.id, "b@x.com").await.unwrap();
    assert_eq!(task.shared_emails().to_vec(), vec!["a@x.com".to_string()]);
}

#[tokio::test]
async fn sharing_twice_with_the_same_email_is_a_noop() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();

    h.container.share_task(task.id, "a@x.com").await.unwrap();
    let outcome = h.container.share_task(task.id, "a@x.com").await.unwrap();
    assert!(outcome.already_shared);
    assert_eq!(h.mailer.invitations().len(), 1);

    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert_eq!(stored.shared_emails().len(), 1);
}

#[tokio::test]
async fn share_rejects_malformed_emails() {
    let h = setup().await;
    let task = h.container.add_task(new_task("Buy milk")).await.unwrap();
    assert!(h.container.share_task(task.id, "not-an-email").await.is_err());
    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert!(stored.shared_with.is_none());
}

#[tokio::test]
async fn completing_a_staked_shared_task_triggers_everything() {
    let h = setup().await;
    let mut data = new_task("Buy milk");
    data.stakes = Some("no dessert".to_string());
    data.shared_with = Some(vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    let task = h.container.add_task(data).await.unwrap();

    let outcome = h.container.toggle_completion(task.id).await.unwrap();
    assert!(outcome.task.completed);
    assert_eq!(outcome.stakes_met.as_deref(), Some("no dessert"));
    assert_eq!(outcome.milestone, None);
    assert!(outcome.warnings.is_empty());

    let notices = h.mailer.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, "Buy milk");
    assert_eq!(
        notices[0].1,
        vec!["a@x.com".to_string(), "b@x.com".to_string()]
    );

    let streak = h.streaks.get_or_create(h.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 1);
    assert_eq!(
        streak.last_completed_date,
        Some(Local::now().date_naive())
    );
    assert_eq!(streak.streak_history.0.len(), 1);
}

#[tokio::test]
async fn recompleting_the_same_day_stays_quiet() {
    let h = setup().await;
    let mut data = new_task("Buy milk");
    data.shared_with = Some(vec!["a@x.com".to_string()]);
    let task = h.container.add_task(data).await.unwrap();

    h.container.toggle_completion(task.id).await.unwrap();
    let outcome = h.container.toggle_completion(task.id).await.unwrap();
    assert!(!outcome.task.completed);

    let outcome = h.container.toggle_completion(task.id).await.unwrap();
    assert!(outcome.task.completed);

    // One notice for the day, and the streak held rather than double-counted.
    assert_eq!(h.mailer.notices().len(), 1);
    let streak = h.streaks.get_or_create(h.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.streak_history.0.len(), 1);
}

#[tokio::test]
async fn uncompleting_has_no_side_effects() {
    let h = setup().await;
    let mut data = new_task("Buy milk");
    data.shared_with = Some(vec!["a@x.com".to_string()]);
    let task = h.container.add_task(data).await.unwrap();

    h.container.toggle_completion(task.id).await.unwrap();
    let notices_before = h.mailer.notices().len();
    let outcome = h.container.toggle_completion(task.id).await.unwrap();

    assert!(!outcome.task.completed);
    assert!(outcome.stakes_met.is_none());
    assert_eq!(h.mailer.notices().len(), notices_before);
}

#[tokio::test]
async fn mail_failure_never_rolls_back_the_mutation() {
    let h = setup_with(RecordingMailer::failing()).await;
    let mut data = new_task("Buy milk");
    data.shared_with = Some(vec!["a@x.com".to_string()]);
    let task = h.container.add_task(data).await.unwrap();

    // Failed invitation: the share is already persisted.
    let outcome = h.container.share_task(task.id, "b@x.com").await.unwrap();
    assert!(!outcome.warnings.is_empty());
    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert!(stored.is_shared_with("b@x.com"));

    // Failed completion notice: the task stays completed.
    let outcome = h.container.toggle_completion(task.id).await.unwrap();
    assert!(outcome.task.completed);
    assert!(!outcome.warnings.is_empty());
    let stored = h.store.find(task.id).await.unwrap().unwrap();
    assert!(stored.completed);
}

#[tokio::test]
async fn change_feed_refreshes_the_container() {
    let h = setup().await;
    let today = h.container.selected_date().await;

    h.store
        .create(h.user_id, CreateTask::from_title_date("From elsewhere", today))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let tasks = h.container.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "From elsewhere");
}

#[tokio::test]
async fn closed_container_ignores_late_events() {
    let h = setup().await;
    let today = h.container.selected_date().await;

    h.container.close().await;
    h.store
        .create(h.user_id, CreateTask::from_title_date("After logout", today))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.container.tasks().await.is_empty());
}

#[tokio::test]
async fn streak_record_is_created_lazily_with_zeroes() {
    let h = setup().await;
    let streak = h.streaks.get_or_create(h.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 0);
    assert_eq!(streak.longest_streak, 0);
    assert!(streak.last_completed_date.is_none());
    assert!(streak.streak_history.0.is_empty());

    // A second read returns the same record.
    let again = h.streaks.get_or_create(h.user_id).await.unwrap();
    assert_eq!(again.id, streak.id);
}
