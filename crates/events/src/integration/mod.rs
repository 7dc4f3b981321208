//! Integration events: the typed contract between components.
//!
//! Every routing key maps to exactly one [`IntegrationEvent`] variant. Producers
//! publish `EventEnvelope<serde_json::Value>` built with [`IntegrationEvent::to_envelope`];
//! consumers decode with [`IntegrationEvent::from_envelope`] and match on the tag
//! instead of probing untyped JSON.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::envelope::EventEnvelope;

pub mod payloads;
pub mod types;

pub use payloads::*;
pub use types::*;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("malformed payload for {routing_key}: {reason}")]
    Payload { routing_key: String, reason: String },

    #[error("failed to encode {routing_key}: {reason}")]
    Encode { routing_key: String, reason: String },
}

macro_rules! integration_events {
    ($($key:literal => $variant:ident($payload:ty)),+ $(,)?) => {
        /// Tagged union of every event that crosses a component boundary.
        #[derive(Debug, Clone, PartialEq)]
        pub enum IntegrationEvent {
            $($variant($payload),)+
        }

        impl IntegrationEvent {
            /// All routing keys this contract knows about.
            pub const ROUTING_KEYS: &'static [&'static str] = &[$($key,)+];

            pub fn routing_key(&self) -> &'static str {
                match self {
                    $(IntegrationEvent::$variant(_) => $key,)+
                }
            }

            fn payload_json(&self) -> Result<JsonValue, serde_json::Error> {
                match self {
                    $(IntegrationEvent::$variant(p) => serde_json::to_value(p),)+
                }
            }

            fn decode(routing_key: &str, payload: &JsonValue) -> Result<Self, DecodeError> {
                match routing_key {
                    $($key => serde_json::from_value::<$payload>(payload.clone())
                        .map(IntegrationEvent::$variant)
                        .map_err(|e| DecodeError::Payload {
                            routing_key: routing_key.to_string(),
                            reason: e.to_string(),
                        }),)+
                    other => Err(DecodeError::UnknownRoutingKey(other.to_string())),
                }
            }
        }
    };
}

integration_events! {
    "company.created" => CompanyCreated(CompanyCreated),
    "company.verified" => CompanyVerified(CompanyVerified),
    "company.subscription.updated" => SubscriptionUpdated(SubscriptionUpdated),
    "companies.member.accepted" => MemberAccepted(MemberAccepted),
    "companies.member.invited" => MemberInvited(MemberInvited),
    "identify.user.invited" => UserInvited(UserInvited),
    "job.created" => JobCreated(JobSnapshot),
    "job.published" => JobPublished(JobSnapshot),
    "job.deleted" => JobDeleted(JobDeleted),
    "job.featured" => JobFeatured(JobFeatured),
    "job.hot" => JobHot(JobHot),
    "job.status.changed" => JobStatusChanged(JobStatusChanged),
    "job.application" => JobApplication(JobApplicationReceived),
    "application.status.updated" => ApplicationStatusUpdated(ApplicationStatusUpdated),
    "job.save" => JobSaved(JobSaved),
}

impl IntegrationEvent {
    /// Wrap into a wire envelope with a fresh event id.
    pub fn to_envelope(&self) -> Result<EventEnvelope<JsonValue>, DecodeError> {
        let payload = self.payload_json().map_err(|e| DecodeError::Encode {
            routing_key: self.routing_key().to_string(),
            reason: e.to_string(),
        })?;
        Ok(EventEnvelope::new(self.routing_key(), payload))
    }

    /// Decode a wire envelope, keeping its id and timestamps.
    pub fn from_envelope(
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<EventEnvelope<IntegrationEvent>, DecodeError> {
        let event = Self::decode(envelope.routing_key(), envelope.payload())?;
        Ok(EventEnvelope::with_metadata(
            envelope.event_id(),
            envelope.routing_key(),
            envelope.occurred_at(),
            event,
        ))
    }
}
