//! Handler types, dependencies, and user helpers

use std::sync::Arc;

use teloxide::types::Message;

use dropcore::core::Settings;
use dropcore::job::JobRegistry;
use dropcore::pipeline::Pipeline;
use dropcore::storage::SqliteStore;

use crate::telegram::transport::TeloxideTransport;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub store: SqliteStore,
    pub registry: Arc<JobRegistry>,
    pub pipeline: Arc<Pipeline>,
    pub transport: Arc<TeloxideTransport>,
    pub settings: Arc<Settings>,
}

impl HandlerDeps {
    pub fn new(
        store: SqliteStore,
        registry: Arc<JobRegistry>,
        pipeline: Arc<Pipeline>,
        transport: Arc<TeloxideTransport>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            registry,
            pipeline,
            transport,
            settings,
        }
    }
}

/// Sender of a message as the signed id the store uses.
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

pub fn sender_username(msg: &Message) -> Option<String> {
    msg.from.as_ref().and_then(|u| u.username.clone())
}

/// Makes sure the sender has a row; failures are logged, never fatal.
pub async fn ensure_user_exists(deps: &HandlerDeps, user_id: i64, username: Option<String>) {
    if let Err(e) = deps.store.add_user(user_id, username).await {
        log::error!("Failed to register user {}: {}", user_id, e);
    }
}
