//! Payloads of the account lifecycle events.
//!
//! Field names are camelCase on the wire; consumers read `userId`, `username`,
//! `email` from every event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use authsvc_core::UserId;

use crate::event::IntegrationEvent;
use crate::routing::AuthRoutingKey;

/// A new account was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistered {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl IntegrationEvent for UserRegistered {
    const EVENT_TYPE: &'static str = "USER_REGISTERED";
    const ROUTING_KEY: AuthRoutingKey = AuthRoutingKey::UserRegistered;
}

/// A user authenticated successfully.
///
/// `fcm_token` is the device token the client sent with the login, forwarded
/// so the notification service can target the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoggedIn {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    #[serde(with = "crate::event::iso_millis")]
    pub login_at: DateTime<Utc>,
}

impl IntegrationEvent for UserLoggedIn {
    const EVENT_TYPE: &'static str = "USER_LOGGED_IN";
    const ROUTING_KEY: AuthRoutingKey = AuthRoutingKey::UserLoggedIn;
}

/// A password reset link was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequested {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub reset_url: String,
    #[serde(with = "crate::event::iso_millis")]
    pub expires_at: DateTime<Utc>,
}

impl IntegrationEvent for PasswordResetRequested {
    const EVENT_TYPE: &'static str = "PASSWORD_RECOVERY_REQUESTED";
    const ROUTING_KEY: AuthRoutingKey = AuthRoutingKey::PasswordResetRequested;
}

/// An account was deleted by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl IntegrationEvent for UserDeleted {
    const EVENT_TYPE: &'static str = "USER_DELETED";
    const ROUTING_KEY: AuthRoutingKey = AuthRoutingKey::UserDeleted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainEvent;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn user_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0001))
    }

    #[test]
    fn registered_payload_uses_camel_case_fields() {
        let event = UserRegistered {
            user_id: user_id(),
            username: "alice".into(),
            email: "a@x.com".into(),
            role: "user".into(),
        };
        let domain = DomainEvent::from_typed(&event, Utc::now()).unwrap();

        assert_eq!(domain.event_type(), "USER_REGISTERED");
        let payload = domain.payload();
        assert_eq!(payload["userId"], user_id().to_string());
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["email"], "a@x.com");
        assert_eq!(payload["role"], "user");
    }

    #[test]
    fn logged_in_omits_missing_device_token() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let event = UserLoggedIn {
            user_id: user_id(),
            username: "alice".into(),
            email: "a@x.com".into(),
            role: "admin".into(),
            fcm_token: None,
            login_at: at,
        };
        let domain = DomainEvent::from_typed(&event, at).unwrap();

        assert!(domain.payload().get("fcmToken").is_none());
        assert_eq!(domain.payload()["loginAt"], "2025-01-02T03:04:05.000Z");

        let with_token = UserLoggedIn {
            fcm_token: Some("device-123".into()),
            ..event
        };
        let domain = DomainEvent::from_typed(&with_token, at).unwrap();
        assert_eq!(domain.payload()["fcmToken"], "device-123");
    }

    #[test]
    fn reset_requested_carries_url_and_expiry() {
        let expires = Utc.with_ymd_and_hms(2025, 6, 1, 12, 10, 0).unwrap();
        let event = PasswordResetRequested {
            user_id: user_id(),
            username: "alice".into(),
            email: "a@x.com".into(),
            reset_url: "http://localhost:3001/reset-password?token=abc".into(),
            expires_at: expires,
        };
        let domain = DomainEvent::from_typed(&event, Utc::now()).unwrap();

        assert_eq!(domain.event_type(), "PASSWORD_RECOVERY_REQUESTED");
        assert_eq!(
            domain.payload()["resetUrl"],
            "http://localhost:3001/reset-password?token=abc"
        );
        assert_eq!(domain.payload()["expiresAt"], "2025-06-01T12:10:00.000Z");

        let back: PasswordResetRequested =
            serde_json::from_value(domain.payload().clone()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn each_event_routes_to_its_own_key() {
        assert_eq!(UserRegistered::ROUTING_KEY.as_str(), "auth.user.registered");
        assert_eq!(UserLoggedIn::ROUTING_KEY.as_str(), "auth.user.logged_in");
        assert_eq!(
            PasswordResetRequested::ROUTING_KEY.as_str(),
            "auth.password.reset_requested"
        );
        assert_eq!(UserDeleted::ROUTING_KEY.as_str(), "auth.user.deleted");
    }
}
