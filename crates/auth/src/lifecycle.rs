//! Announcing account lifecycle changes.
//!
//! Every announcement happens after the change committed and is best effort:
//! a failed publish is logged and reported as [`EventDelivery::NotPublished`],
//! never as a failure of the change itself.

use chrono::Utc;
use tracing::{debug, error, warn};

use authsvc_events::{
    DomainEvent, EventPublisher, IntegrationEvent, PasswordResetRequested, UserDeleted,
    UserLoggedIn, UserRegistered,
};

use crate::account::AccountSnapshot;
use crate::outcome::{ActionOutcome, EventDelivery};
use crate::reset::ResetLink;

/// A lifecycle change worth telling other services about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Registered(AccountSnapshot),
    LoggedIn {
        account: AccountSnapshot,
        device_token: Option<String>,
    },
    PasswordResetRequested {
        account: AccountSnapshot,
        link: ResetLink,
    },
    Deleted(AccountSnapshot),
}

/// Publishes account lifecycle events through an [`EventPublisher`].
#[derive(Debug, Clone)]
pub struct AccountEvents<P> {
    publisher: P,
}

impl<P: EventPublisher> AccountEvents<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub async fn registered(&self, account: &AccountSnapshot) -> EventDelivery {
        self.emit(&UserRegistered {
            user_id: account.user_id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role.to_string(),
        })
        .await
    }

    /// `device_token` is the push token the client sent with the login, if any.
    pub async fn logged_in(
        &self,
        account: &AccountSnapshot,
        device_token: Option<&str>,
    ) -> EventDelivery {
        self.emit(&UserLoggedIn {
            user_id: account.user_id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role.to_string(),
            fcm_token: device_token.map(str::to_string),
            login_at: Utc::now(),
        })
        .await
    }

    pub async fn password_reset_requested(
        &self,
        account: &AccountSnapshot,
        link: &ResetLink,
    ) -> EventDelivery {
        self.emit(&PasswordResetRequested {
            user_id: account.user_id,
            username: account.username.clone(),
            email: account.email.clone(),
            reset_url: link.url.clone(),
            expires_at: link.expires_at,
        })
        .await
    }

    pub async fn deleted(&self, account: &AccountSnapshot) -> EventDelivery {
        self.emit(&UserDeleted {
            user_id: account.user_id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role.to_string(),
        })
        .await
    }

    pub async fn publish(&self, event: &AccountEvent) -> EventDelivery {
        match event {
            AccountEvent::Registered(account) => self.registered(account).await,
            AccountEvent::LoggedIn {
                account,
                device_token,
            } => self.logged_in(account, device_token.as_deref()).await,
            AccountEvent::PasswordResetRequested { account, link } => {
                self.password_reset_requested(account, link).await
            }
            AccountEvent::Deleted(account) => self.deleted(account).await,
        }
    }

    /// Announce a committed action.
    ///
    /// Nothing is published when `committed` is an error; the error is handed
    /// back untouched. Otherwise the event built from the committed value is
    /// published and its delivery is reported next to the value.
    pub async fn announce<T, E, F>(
        &self,
        committed: Result<T, E>,
        build: F,
    ) -> Result<ActionOutcome<T>, E>
    where
        F: FnOnce(&T) -> AccountEvent,
    {
        let value = committed?;
        let event = build(&value);
        let delivery = self.publish(&event).await;
        Ok(ActionOutcome { value, delivery })
    }

    async fn emit<E: IntegrationEvent>(&self, payload: &E) -> EventDelivery {
        let routing_key = E::ROUTING_KEY.as_str();

        let event = match DomainEvent::from_typed(payload, Utc::now()) {
            Ok(event) => event,
            Err(err) => {
                error!(event_type = E::EVENT_TYPE, error = %err, "failed to build domain event");
                return EventDelivery::NotPublished;
            }
        };

        let delivery = EventDelivery::from(self.publisher.publish(routing_key, event).await);
        if delivery.is_published() {
            debug!(event_type = E::EVENT_TYPE, routing_key, "account event published");
        } else {
            warn!(
                event_type = E::EVENT_TYPE,
                routing_key, "account event not published; action stays committed"
            );
        }
        delivery
    }
}
