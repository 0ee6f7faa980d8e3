//! # Notification Bridge
//!
//! Listens to workflow events and sends a short markdown summary to the
//! order owner and whoever has to act next. Delivery is best effort: a
//! failing channel is logged and never reaches the workflow caller.

use crate::config::NotificationConfig;
use crate::events::{EventPublisher, WorkflowEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("message channel rejected the message: {0}")]
    Delivery(String),

    #[error("message channel unavailable: {0}")]
    Unavailable(String),
}

/// Outbound chat/message channel
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Send one markdown message to the given channel user ids
    async fn send_markdown(
        &self,
        recipients: &[String],
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct NotificationBridge {
    channel: Arc<dyn MessageChannel>,
    recipients: Arc<HashMap<String, String>>,
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("recipients", &self.recipients.len())
            .finish_non_exhaustive()
    }
}

impl NotificationBridge {
    pub fn new(channel: Arc<dyn MessageChannel>, config: &NotificationConfig) -> Self {
        Self {
            channel,
            recipients: Arc::new(config.recipients.clone()),
        }
    }

    /// Channel ids for the owner and next actors. Unmapped users are skipped.
    pub fn recipients_for(&self, event: &WorkflowEvent) -> Vec<String> {
        let mut ids = Vec::new();
        for username in event.recipients() {
            match self.recipients.get(&username) {
                Some(id) if !ids.contains(id) => ids.push(id.clone()),
                Some(_) => {}
                None => debug!(username = %username, "No message channel id configured"),
            }
        }
        ids
    }

    pub fn render_title(event: &WorkflowEvent) -> String {
        format!("[{}] {}", event.work_id, event.label.display_text())
    }

    pub fn render_markdown(event: &WorkflowEvent) -> String {
        let mut body = format!(
            "### {}\n\n- **Work id**: {}\n- **Status**: {}\n- **Step**: {}\n- **By**: {}\n- **Owner**: {}\n",
            event.label.display_text(),
            event.work_id,
            event.label.code(),
            event.step,
            event.actor,
            event.owner,
        );
        if !event.next_actors.is_empty() {
            body.push_str(&format!("- **Next**: {}\n", event.next_actors.join(", ")));
        }
        if let Some(comment) = event.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            body.push_str(&format!("\n> {comment}\n"));
        }
        body
    }

    /// Deliver one event. No mapped recipients is not an error.
    pub async fn handle(&self, event: &WorkflowEvent) -> Result<(), NotifyError> {
        let recipients = self.recipients_for(event);
        if recipients.is_empty() {
            debug!(order_id = event.order_id, event = event.name(), "No recipients to notify");
            return Ok(());
        }

        self.channel
            .send_markdown(
                &recipients,
                &Self::render_title(event),
                &Self::render_markdown(event),
            )
            .await
    }

    /// Subscribe to `publisher` and deliver events until the channel closes
    pub fn spawn(self, publisher: &EventPublisher) -> JoinHandle<()> {
        let mut receiver = publisher.subscribe();

        tokio::spawn(async move {
            info!("Notification bridge started");

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.handle(&event).await {
                            error!(
                                order_id = event.order_id,
                                work_id = %event.work_id,
                                event = event.name(),
                                error = %e,
                                "Failed to deliver workflow notification"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(
                            lagged_count = count,
                            "Notification bridge lagged behind - some events were not delivered"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed - stopping notification bridge");
                        break;
                    }
                }
            }
        })
    }
}
