use chrono::Utc;

use authsvc_auth::{AccountEvents, AccountSnapshot, EventDelivery, ResetLink, ResetLinkPolicy};
use authsvc_events::EventPublisher;

/// Dependencies shared by every request handler.
///
/// Built once at startup and passed explicitly; there is no global publisher.
#[derive(Debug, Clone)]
pub struct ServiceContext<P> {
    publisher: P,
    account_events: AccountEvents<P>,
    reset_policy: ResetLinkPolicy,
}

impl<P: EventPublisher + Clone> ServiceContext<P> {
    pub fn new(publisher: P, reset_policy: ResetLinkPolicy) -> Self {
        Self {
            account_events: AccountEvents::new(publisher.clone()),
            publisher,
            reset_policy,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn account_events(&self) -> &AccountEvents<P> {
        &self.account_events
    }

    pub fn reset_policy(&self) -> &ResetLinkPolicy {
        &self.reset_policy
    }

    /// Mint a reset link for `account` and announce it.
    ///
    /// The link is returned even when the announcement fails; the caller
    /// persists it either way.
    pub async fn request_password_reset(
        &self,
        account: &AccountSnapshot,
    ) -> (ResetLink, EventDelivery) {
        let link = self.reset_policy.issue(Utc::now());
        let delivery = self
            .account_events
            .password_reset_requested(account, &link)
            .await;
        (link, delivery)
    }
}
