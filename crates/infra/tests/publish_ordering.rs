//! Confirmation ordering under sequential and concurrent publishing.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

use authsvc_events::{AuthRoutingKey, DomainEvent};
use authsvc_infra::event_bus::{BrokerPublisher, InMemoryBroker, PublisherSettings};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

fn numbered_event(seq: usize) -> DomainEvent {
    DomainEvent::new("USER_LOGGED_IN", Utc::now(), json!({ "seq": seq })).unwrap()
}

fn seq_of(event: &DomainEvent) -> u64 {
    event.payload()["seq"].as_u64().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: N sequential publishes yield N acks, delivered in submission order.
    #[test]
    fn sequential_publishes_are_confirmed_in_order(
        keys in prop::collection::vec(0usize..AuthRoutingKey::ALL.len(), 1..40)
    ) {
        let (acks, messages) = runtime().block_on(async {
            let broker = InMemoryBroker::new();
            let publisher = BrokerPublisher::new(broker.clone(), PublisherSettings::default());

            let mut acks = Vec::with_capacity(keys.len());
            for (seq, key) in keys.iter().enumerate() {
                let routing_key = AuthRoutingKey::ALL[*key].as_str();
                acks.push(publisher.publish(routing_key, numbered_event(seq)).await);
            }
            (acks, broker.messages())
        });

        prop_assert!(acks.iter().all(|ack| *ack));
        prop_assert_eq!(messages.len(), keys.len());
        for (seq, (message, key)) in messages.iter().zip(&keys).enumerate() {
            prop_assert_eq!(message.delivery_tag, seq as u64 + 1);
            prop_assert_eq!(message.routing_key.as_str(), AuthRoutingKey::ALL[*key].as_str());
            prop_assert_eq!(seq_of(&message.decode().unwrap()), seq as u64);
        }
    }

    /// Property: concurrent publishers on one session each get exactly one confirmation.
    #[test]
    fn concurrent_publishes_each_get_one_confirmation(count in 1usize..32) {
        let (acks, messages, confirmed) = runtime().block_on(async {
            let broker = InMemoryBroker::new();
            let publisher = BrokerPublisher::new(broker.clone(), PublisherSettings::default());
            publisher.connect().await;

            let handles: Vec<_> = (0..count)
                .map(|seq| {
                    let publisher = publisher.clone();
                    tokio::spawn(async move {
                        publisher.publish("auth.user.logged_in", numbered_event(seq)).await
                    })
                })
                .collect();

            let mut acks = Vec::with_capacity(count);
            for handle in handles {
                acks.push(handle.await.unwrap());
            }
            (acks, broker.messages(), publisher.stats().confirmed)
        });

        prop_assert!(acks.iter().all(|ack| *ack));
        prop_assert_eq!(confirmed, count as u64);

        let tags: Vec<u64> = messages.iter().map(|m| m.delivery_tag).collect();
        prop_assert_eq!(tags, (1..=count as u64).collect::<Vec<_>>());

        let mut seqs: Vec<u64> = messages.iter().map(|m| seq_of(&m.decode().unwrap())).collect();
        seqs.sort_unstable();
        prop_assert_eq!(seqs, (0..count as u64).collect::<Vec<_>>());
    }
}
