//! The recipient's side: reading notifications and registering devices.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use jobmesh_auth::Actor;
use jobmesh_core::{DomainError, NotificationId};

use super::model::Notification;
use super::store::{DeviceToken, DeviceTokenRepository, NotificationRepository, Platform};
use crate::error::ServiceResult;
use crate::pagination::{PageRequest, Pagination, paginate};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRegistration {
    pub token: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub platform: Platform,
}

pub struct NotificationInbox {
    notifications: Arc<dyn NotificationRepository>,
    tokens: Arc<dyn DeviceTokenRepository>,
}

impl NotificationInbox {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        tokens: Arc<dyn DeviceTokenRepository>,
    ) -> Self {
        Self {
            notifications,
            tokens,
        }
    }

    pub fn list(
        &self,
        actor: &Actor,
        unread_only: bool,
        page: PageRequest,
    ) -> ServiceResult<(Vec<Notification>, Pagination)> {
        let all = self.notifications.list_for_user(actor.user_id(), unread_only)?;
        Ok(paginate(all, page))
    }

    pub fn unread_count(&self, actor: &Actor) -> ServiceResult<usize> {
        Ok(self.notifications.unread_count(actor.user_id())?)
    }

    pub fn mark_read(&self, id: NotificationId, actor: &Actor) -> ServiceResult<Notification> {
        Ok(self.notifications.mark_read(id, actor.user_id())?)
    }

    pub fn mark_all_read(&self, actor: &Actor) -> ServiceResult<usize> {
        Ok(self.notifications.mark_all_read(actor.user_id())?)
    }

    #[instrument(skip(self, registration), fields(user_id = %actor.user_id()), err)]
    pub fn register_token(
        &self,
        actor: &Actor,
        registration: TokenRegistration,
        now: DateTime<Utc>,
    ) -> ServiceResult<DeviceToken> {
        let token = registration.token.trim();
        if token.is_empty() {
            return Err(DomainError::validation("token is required").into());
        }
        let stored = self.tokens.register(
            actor.user_id(),
            token,
            registration.device_id,
            registration.platform,
            now,
        )?;
        info!(platform = ?stored.platform, "device token registered");
        Ok(stored)
    }
}
