// app_state.rs

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{
    config::AppConfig,
    errors::RemoteError,
    repositories::{ApiClient, HttpNotificationDispatcher},
    services::{InvitationService, LinkService, NotificationQueue, NotificationQueueConfig},
    store::InvitationStore,
    utils::{invitation_validator::InvitationValidator, time::SystemClock},
};

/// Application state containing the wired-up services
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle operations; also exposes the link service
    pub invitations: InvitationService,
    /// Local mirror shared by every service
    pub store: InvitationStore,
    /// Handle onto the notification worker
    pub notifier: NotificationQueue,
}

impl AppState {
    /// Builds the HTTP clients and services and starts the notification worker.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new(config: &AppConfig) -> Result<(Self, JoinHandle<()>), RemoteError> {
        let client = ApiClient::new(
            config.api_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )?;

        let dispatcher = Arc::new(HttpNotificationDispatcher::new(client.clone()));
        let (notifier, worker) = NotificationQueue::spawn(
            dispatcher,
            NotificationQueueConfig {
                max_attempts: config.notify_max_attempts,
                initial_backoff: config.notify_backoff,
                ..NotificationQueueConfig::default()
            },
        );

        let api = Arc::new(client);
        let store = InvitationStore::new();
        let links = LinkService::new(api.clone(), store.clone(), notifier.clone());
        let invitations = InvitationService::new(
            api,
            links,
            store.clone(),
            notifier.clone(),
            InvitationValidator::new(&config.denylist),
            Arc::new(SystemClock),
        );

        Ok((
            Self {
                invitations,
                store,
                notifier,
            },
            worker,
        ))
    }
}
