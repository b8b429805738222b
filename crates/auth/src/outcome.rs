/// Whether the event announcing an action reached the broker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventDelivery {
    Published,
    NotPublished,
}

impl EventDelivery {
    pub fn is_published(self) -> bool {
        matches!(self, EventDelivery::Published)
    }
}

impl From<bool> for EventDelivery {
    fn from(published: bool) -> Self {
        if published {
            EventDelivery::Published
        } else {
            EventDelivery::NotPublished
        }
    }
}

/// A committed action plus the fate of its event.
///
/// `delivery == NotPublished` means the action itself succeeded; only the
/// announcement failed. Callers must not report the action as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome<T> {
    pub value: T,
    pub delivery: EventDelivery,
}

impl<T> ActionOutcome<T> {
    pub fn event_published(&self) -> bool {
        self.delivery.is_published()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
