//! Persist-then-push delivery of notification drafts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::{DeliveryState, Notification, NotificationDraft};
use super::push::{PushError, PushMessage, PushProvider};
use super::store::{DeviceTokenRepository, NotificationRepository};
use super::templates::deep_link;
use crate::error::StoreError;

pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationRepository>,
    tokens: Arc<dyn DeviceTokenRepository>,
    push: Arc<dyn PushProvider>,
    frontend_url: String,
    ttl: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        tokens: Arc<dyn DeviceTokenRepository>,
        push: Arc<dyn PushProvider>,
        frontend_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            notifications,
            tokens,
            push,
            frontend_url: frontend_url.into(),
            ttl,
        }
    }

    /// Store the notification, then push it to the recipient's active devices.
    ///
    /// Redelivery of the same source event reuses the stored row and only
    /// retries push when it was not sent before. Push failures are recorded on
    /// the row; only store failures are returned.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, kind = %draft.kind), err)]
    pub fn create_and_send(
        &self,
        draft: NotificationDraft,
        source_event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let (mut notification, created) = self
            .notifications
            .insert_if_absent(Notification::new(draft, source_event_id, now, self.ttl))?;

        if !created && notification.delivery_status.push == DeliveryState::Sent {
            debug!(notification_id = %notification.id, "duplicate delivery, push already sent");
            return Ok(notification);
        }

        let state = self.deliver(&notification)?;
        self.notifications.update_push(notification.id, state)?;
        notification.delivery_status.push = state;
        info!(notification_id = %notification.id, push = ?state, "notification dispatched");
        Ok(notification)
    }

    fn deliver(&self, notification: &Notification) -> Result<DeliveryState, StoreError> {
        let tokens = self.tokens.active_tokens(notification.user_id)?;
        let message = self.message(notification);

        match tokens.as_slice() {
            [] => {
                warn!(user_id = %notification.user_id, "no active device tokens");
                Ok(DeliveryState::Failed)
            }
            [token] => match self.push.send(token, &message) {
                Ok(()) => Ok(DeliveryState::Sent),
                Err(PushError::InvalidToken) => {
                    self.tokens.deactivate(token)?;
                    warn!("device token rejected and deactivated");
                    Ok(DeliveryState::Failed)
                }
                Err(err) => {
                    warn!(error = %err, "push failed");
                    Ok(DeliveryState::Failed)
                }
            },
            _ => match self.push.send_multicast(&tokens, &message) {
                Ok(report) => {
                    for (token, outcome) in tokens.iter().zip(&report.responses) {
                        if matches!(outcome, Err(PushError::InvalidToken)) {
                            self.tokens.deactivate(token)?;
                        }
                    }
                    debug!(
                        succeeded = report.success_count(),
                        failed = report.failure_count(),
                        "multicast finished"
                    );
                    if report.success_count() > 0 {
                        Ok(DeliveryState::Sent)
                    } else {
                        Ok(DeliveryState::Failed)
                    }
                }
                Err(err) => {
                    warn!(error = %err, tokens = tokens.len(), "multicast failed");
                    Ok(DeliveryState::Failed)
                }
            },
        }
    }

    fn message(&self, notification: &Notification) -> PushMessage {
        let mut data: BTreeMap<String, String> = notification
            .metadata
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        data.insert("notificationId".into(), notification.id.to_string());
        data.insert("type".into(), notification.kind.clone());

        PushMessage {
            title: notification.title.clone(),
            body: notification.message.clone(),
            link: deep_link(&self.frontend_url, notification),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::model::NotificationMetadata;
    use crate::notifications::push::InMemoryPushProvider;
    use crate::notifications::store::{InMemoryDeviceTokenStore, InMemoryNotificationStore, Platform};
    use jobmesh_core::{JobId, UserId};
    use jobmesh_events::integration::Priority;

    struct Fixture {
        notifications: Arc<InMemoryNotificationStore>,
        tokens: Arc<InMemoryDeviceTokenStore>,
        push: Arc<InMemoryPushProvider>,
        dispatcher: NotificationDispatcher,
    }

    fn fixture() -> Fixture {
        let notifications = Arc::new(InMemoryNotificationStore::new());
        let tokens = Arc::new(InMemoryDeviceTokenStore::new());
        let push = Arc::new(InMemoryPushProvider::new());
        let dispatcher = NotificationDispatcher::new(
            notifications.clone(),
            tokens.clone(),
            push.clone(),
            "https://jobs.example.com",
            Duration::days(30),
        );
        Fixture {
            notifications,
            tokens,
            push,
            dispatcher,
        }
    }

    fn draft(user: UserId) -> NotificationDraft {
        NotificationDraft {
            user_id: user,
            title: "Job saved".into(),
            message: "Job \"Rust Engineer\" saved".into(),
            kind: "job_saved".into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                job_id: Some(JobId::new()),
                job_slug: Some("rust-engineer".into()),
                ..Default::default()
            },
            actions: vec![],
        }
    }

    #[test]
    fn without_tokens_push_is_failed_but_row_is_kept() {
        let f = fixture();
        let user = UserId::new();

        let n = f.dispatcher.create_and_send(draft(user), Some(Uuid::now_v7()), Utc::now()).unwrap();
        assert_eq!(n.delivery_status.push, DeliveryState::Failed);
        assert_eq!(n.delivery_status.email, DeliveryState::Skipped);
        let stored = f.notifications.get(n.id).unwrap().unwrap();
        assert_eq!(stored.delivery_status.push, DeliveryState::Failed);
        assert_eq!(stored.expires_at, stored.created_at + Duration::days(30));
    }

    #[test]
    fn single_token_gets_a_deep_linked_push() {
        let f = fixture();
        let user = UserId::new();
        f.tokens.register(user, "tok-1", None, Platform::Web, Utc::now()).unwrap();

        let n = f.dispatcher.create_and_send(draft(user), None, Utc::now()).unwrap();
        assert_eq!(n.delivery_status.push, DeliveryState::Sent);
        let sent = f.push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.link, "https://jobs.example.com/jobs/rust-engineer");
        assert_eq!(sent[0].1.data["jobSlug"], "rust-engineer");
    }

    #[test]
    fn multicast_deactivates_rejected_tokens() {
        let f = fixture();
        let user = UserId::new();
        let now = Utc::now();
        f.tokens.register(user, "fresh", None, Platform::Ios, now).unwrap();
        f.tokens.register(user, "stale", None, Platform::Android, now).unwrap();
        f.push.reject_token("stale");

        let n = f.dispatcher.create_and_send(draft(user), None, now).unwrap();
        assert_eq!(n.delivery_status.push, DeliveryState::Sent);
        assert_eq!(f.tokens.active_tokens(user).unwrap(), vec!["fresh"]);
    }

    #[test]
    fn redelivery_creates_one_row_and_pushes_once() {
        let f = fixture();
        let user = UserId::new();
        let source = Uuid::now_v7();
        f.tokens.register(user, "tok-1", None, Platform::Web, Utc::now()).unwrap();

        let first = f.dispatcher.create_and_send(draft(user), Some(source), Utc::now()).unwrap();
        let second = f.dispatcher.create_and_send(draft(user), Some(source), Utc::now()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(f.push.sent().len(), 1);
        assert_eq!(f.notifications.list_for_user(user, false).unwrap().len(), 1);
    }

    #[test]
    fn redelivery_retries_a_failed_push() {
        let f = fixture();
        let user = UserId::new();
        let source = Uuid::now_v7();
        f.tokens.register(user, "tok-1", None, Platform::Web, Utc::now()).unwrap();
        f.push.set_offline(true);

        let first = f.dispatcher.create_and_send(draft(user), Some(source), Utc::now()).unwrap();
        assert_eq!(first.delivery_status.push, DeliveryState::Failed);

        f.push.set_offline(false);
        let second = f.dispatcher.create_and_send(draft(user), Some(source), Utc::now()).unwrap();
        assert_eq!(second.delivery_status.push, DeliveryState::Sent);
        assert_eq!(f.push.sent().len(), 1);
    }
}
