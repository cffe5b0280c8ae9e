//! HTTP surface for the daily task manager: per-session task containers
//! behind thin JSON routes.

pub mod error;
pub mod routes;

use std::{collections::HashMap, sync::Arc};

use axum::Router;
use db::DBService;
use services::services::{
    config::Config,
    mailer::{Mailer, MailgunMailer, NotificationError},
    streak::StreakService,
    task_list::{SessionContext, TaskListService},
    task_store::TaskStoreService,
};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state: the services plus the registry of per-session
/// task containers, keyed by user id.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStoreService,
    pub streaks: StreakService,
    pub mailer: Arc<dyn Mailer>,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<TaskListService>>>>,
}

impl AppState {
    pub fn new(db: DBService, config: &Config) -> Result<Self, NotificationError> {
        let mailer: Arc<dyn Mailer> = Arc::new(MailgunMailer::new(config.mail.clone())?);
        Ok(Self {
            store: TaskStoreService::new(db.clone()),
            streaks: StreakService::new(db),
            mailer,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Builds and registers a container for a signed-in user, replacing (and
    /// closing) any previous session for the same user.
    pub async fn begin_session(&self, session: SessionContext) -> Arc<TaskListService> {
        let user_id = session.user_id;
        let container = TaskListService::start(
            session,
            self.store.clone(),
            self.streaks.clone(),
            Arc::clone(&self.mailer),
        )
        .await;

        let previous = self
            .sessions
            .write()
            .await
            .insert(user_id, Arc::clone(&container));
        if let Some(previous) = previous {
            previous.close().await;
        }
        container
    }

    /// Closes and unregisters the user's container. False when none existed.
    pub async fn end_session(&self, user_id: Uuid) -> bool {
        let container = self.sessions.write().await.remove(&user_id);
        match container {
            Some(container) => {
                container.close().await;
                true
            }
            None => false,
        }
    }

    /// The container for `user_id`, or the auth-required failure when the
    /// user never signed in (or already signed out).
    pub async fn session(&self, user_id: Uuid) -> Result<Arc<TaskListService>, ApiError> {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(ApiError::AuthRequired)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(routes::sessions::router())
                .merge(routes::email::router())
                .nest(
                    "/sessions/{user_id}",
                    routes::tasks::router().merge(routes::streaks::router()),
                ),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
