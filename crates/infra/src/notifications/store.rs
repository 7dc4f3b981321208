use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobmesh_core::{DomainError, NotificationId, UserId};

use super::model::{DeliveryState, Notification};
use crate::error::StoreError;

pub trait NotificationRepository: Send + Sync {
    /// Insert unless a notification for the same source event exists. Returns
    /// the stored row and whether it was created by this call.
    fn insert_if_absent(&self, notification: Notification) -> Result<(Notification, bool), StoreError>;

    fn update_push(&self, id: NotificationId, state: DeliveryState) -> Result<(), StoreError>;

    fn get(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Fails with `NotFound` when the notification does not belong to `user_id`.
    fn mark_read(&self, id: NotificationId, user_id: UserId) -> Result<Notification, StoreError>;

    fn mark_all_read(&self, user_id: UserId) -> Result<usize, StoreError>;

    fn unread_count(&self, user_id: UserId) -> Result<usize, StoreError>;

    /// Newest first.
    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> Result<Vec<Notification>, StoreError>;

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
struct NotificationTable {
    rows: HashMap<NotificationId, Notification>,
    by_source: HashMap<Uuid, NotificationId>,
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    inner: RwLock<NotificationTable>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationRepository for InMemoryNotificationStore {
    fn insert_if_absent(&self, notification: Notification) -> Result<(Notification, bool), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(source) = notification.source_event_id {
            if let Some(existing) = table.by_source.get(&source).and_then(|id| table.rows.get(id)) {
                return Ok((existing.clone(), false));
            }
            table.by_source.insert(source, notification.id);
        }
        table.rows.insert(notification.id, notification.clone());
        Ok((notification, true))
    }

    fn update_push(&self, id: NotificationId, state: DeliveryState) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("notification {id}")))?;
        row.delivery_status.push = state;
        Ok(())
    }

    fn get(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.rows.get(&id).cloned())
    }

    fn mark_read(&self, id: NotificationId, user_id: UserId) -> Result<Notification, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        match table.rows.get_mut(&id) {
            Some(row) if row.user_id == user_id => {
                row.is_read = true;
                Ok(row.clone())
            }
            _ => Err(DomainError::not_found(format!("notification {id}")).into()),
        }
    }

    fn mark_all_read(&self, user_id: UserId) -> Result<usize, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let mut changed = 0;
        for row in table.rows.values_mut() {
            if row.user_id == user_id && !row.is_read {
                row.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn unread_count(&self, user_id: UserId) -> Result<usize, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table
            .rows
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count())
    }

    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> Result<Vec<Notification>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut list: Vec<Notification> = table
            .rows
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(list)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let before = table.rows.len();
        table.rows.retain(|_, n| !n.is_expired(now));
        let NotificationTable { rows, by_source } = &mut *table;
        by_source.retain(|_, id| rows.contains_key(id));
        Ok(before - rows.len())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Android,
    Ios,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub user_id: UserId,
    pub token: String,
    pub device_id: Option<String>,
    pub platform: Platform,
    pub is_active: bool,
    pub last_used: DateTime<Utc>,
}

pub trait DeviceTokenRepository: Send + Sync {
    /// Upsert by token value. Re-registering reactivates the token and moves it
    /// to `user_id`.
    fn register(
        &self,
        user_id: UserId,
        token: &str,
        device_id: Option<String>,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Result<DeviceToken, StoreError>;

    /// Active tokens for `user_id`, most recently used first.
    fn active_tokens(&self, user_id: UserId) -> Result<Vec<String>, StoreError>;

    fn deactivate(&self, token: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDeviceTokenStore {
    inner: RwLock<HashMap<String, DeviceToken>>,
}

impl InMemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceTokenRepository for InMemoryDeviceTokenStore {
    fn register(
        &self,
        user_id: UserId,
        token: &str,
        device_id: Option<String>,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Result<DeviceToken, StoreError> {
        let mut tokens = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let entry = DeviceToken {
            user_id,
            token: token.to_string(),
            device_id,
            platform,
            is_active: true,
            last_used: now,
        };
        tokens.insert(entry.token.clone(), entry.clone());
        Ok(entry)
    }

    fn active_tokens(&self, user_id: UserId) -> Result<Vec<String>, StoreError> {
        let tokens = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut active: Vec<&DeviceToken> = tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_active)
            .collect();
        active.sort_by(|a, b| b.last_used.cmp(&a.last_used).then_with(|| a.token.cmp(&b.token)));
        Ok(active.into_iter().map(|t| t.token.clone()).collect())
    }

    fn deactivate(&self, token: &str) -> Result<bool, StoreError> {
        let mut tokens = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        match tokens.get_mut(token) {
            Some(t) if t.is_active => {
                t.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::model::{NotificationDraft, NotificationMetadata};
    use chrono::Duration;
    use jobmesh_events::integration::Priority;

    fn notification(user: UserId, source: Option<Uuid>, at: DateTime<Utc>) -> Notification {
        let draft = NotificationDraft {
            user_id: user,
            title: "Job saved".into(),
            message: "saved".into(),
            kind: "job_saved".into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata::default(),
            actions: vec![],
        };
        Notification::new(draft, source, at, Duration::days(30))
    }

    #[test]
    fn one_row_per_source_event() {
        let store = InMemoryNotificationStore::new();
        let (user, source) = (UserId::new(), Uuid::now_v7());

        let (first, created) = store.insert_if_absent(notification(user, Some(source), Utc::now())).unwrap();
        assert!(created);
        let (second, created) = store.insert_if_absent(notification(user, Some(source), Utc::now())).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_for_user(user, false).unwrap().len(), 1);
    }

    #[test]
    fn read_state_is_scoped_to_the_owner() {
        let store = InMemoryNotificationStore::new();
        let (alice, bob) = (UserId::new(), UserId::new());
        let (n, _) = store.insert_if_absent(notification(alice, None, Utc::now())).unwrap();
        store.insert_if_absent(notification(alice, None, Utc::now())).unwrap();

        assert!(matches!(store.mark_read(n.id, bob), Err(StoreError::Domain(_))));
        assert!(store.mark_read(n.id, alice).unwrap().is_read);
        assert_eq!(store.unread_count(alice).unwrap(), 1);
        assert_eq!(store.list_for_user(alice, true).unwrap().len(), 1);
        assert_eq!(store.mark_all_read(alice).unwrap(), 1);
        assert_eq!(store.unread_count(alice).unwrap(), 0);
    }

    #[test]
    fn purge_drops_only_expired_rows() {
        let store = InMemoryNotificationStore::new();
        let user = UserId::new();
        let now = Utc::now();
        let source = Uuid::now_v7();
        store.insert_if_absent(notification(user, Some(source), now - Duration::days(31))).unwrap();
        store.insert_if_absent(notification(user, None, now)).unwrap();

        assert_eq!(store.purge_expired(now).unwrap(), 1);
        assert_eq!(store.list_for_user(user, false).unwrap().len(), 1);
        // The source key is released with its row.
        let (_, created) = store.insert_if_absent(notification(user, Some(source), now)).unwrap();
        assert!(created);
    }

    #[test]
    fn tokens_upsert_and_reactivate() {
        let store = InMemoryDeviceTokenStore::new();
        let user = UserId::new();
        let now = Utc::now();

        store.register(user, "tok-1", None, Platform::Android, now).unwrap();
        store.register(user, "tok-2", Some("pixel".into()), Platform::Android, now + Duration::seconds(1)).unwrap();
        assert_eq!(store.active_tokens(user).unwrap(), vec!["tok-2", "tok-1"]);

        assert!(store.deactivate("tok-1").unwrap());
        assert!(!store.deactivate("tok-1").unwrap());
        assert_eq!(store.active_tokens(user).unwrap(), vec!["tok-2"]);

        store.register(user, "tok-1", None, Platform::Web, now + Duration::seconds(2)).unwrap();
        assert_eq!(store.active_tokens(user).unwrap(), vec!["tok-1", "tok-2"]);
    }
}
