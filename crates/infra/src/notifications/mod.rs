//! In-app notifications with push fan-out.

pub mod consumer;
pub mod dispatcher;
pub mod inbox;
pub mod model;
pub mod push;
pub mod store;
pub mod templates;

pub use consumer::NotificationConsumer;
pub use dispatcher::NotificationDispatcher;
pub use inbox::{NotificationInbox, TokenRegistration};
pub use model::{DeliveryState, DeliveryStatus, Notification, NotificationDraft, NotificationMetadata};
pub use push::{InMemoryPushProvider, LoggingPushProvider, MulticastReport, PushError, PushMessage, PushProvider};
pub use store::{
    DeviceToken, DeviceTokenRepository, InMemoryDeviceTokenStore, InMemoryNotificationStore,
    NotificationRepository, Platform,
};
pub use templates::{NOTIFICATION_BINDINGS, deep_link, render};
