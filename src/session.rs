//! Realtime channel session management
//!
//! This module defines the trait for the publish/subscribe channel carrying
//! room events from the server to this client, and the bookkeeping that
//! keeps at most one subscription alive per room view across transport
//! drops. The channel abstraction allows for different transports (STOMP
//! over WebSocket, Server-Sent Events, test doubles) while the reconnect and
//! resubscribe decisions stay in one place.

use std::{fmt::Display, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use tracing::debug;

use crate::{config::validate_duration, constants, room_id::RoomId};

/// Trait for driving a realtime transport
///
/// Implementations deliver inbound frames back to the client through
/// [`RoomClient::handle_frame`](crate::client::RoomClient::handle_frame) and
/// report connection changes through
/// [`RoomClient::on_connected`](crate::client::RoomClient::on_connected) and
/// [`RoomClient::on_disconnected`](crate::client::RoomClient::on_disconnected).
pub trait Channel {
    /// Opens the transport connection
    ///
    /// # Arguments
    ///
    /// * `endpoint` - URL of the realtime endpoint
    fn connect(&self, endpoint: &str);

    /// Subscribes to a topic on the open connection
    ///
    /// # Arguments
    ///
    /// * `topic` - The topic to receive frames from
    fn subscribe(&self, topic: &Topic);

    /// Cancels a subscription
    fn unsubscribe(&self, topic: &Topic);

    /// Closes the transport connection
    fn disconnect(&self);
}

/// A subscription topic scoped to one room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Returns the topic carrying the events of a room
    pub fn for_room(room_id: &RoomId) -> Self {
        Self(format!("{}{room_id}", constants::realtime::TOPIC_PREFIX))
    }

    /// Returns the topic path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Bounded exponential backoff between reconnect attempts
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    #[serde_as(as = "DurationSeconds<u64>")]
    #[garde(custom(validate_duration::<1, 60>))]
    pub base_delay: Duration,
    /// Upper bound on any delay
    #[serde_as(as = "DurationSeconds<u64>")]
    #[garde(custom(validate_duration::<1, 600>))]
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt; `1` keeps the delay fixed
    #[garde(range(min = 1, max = 10))]
    pub multiplier: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: constants::realtime::RECONNECT_DELAY,
            max_delay: constants::realtime::MAX_RECONNECT_DELAY,
            multiplier: constants::realtime::RECONNECT_MULTIPLIER,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that always waits the same delay
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            multiplier: 1,
        }
    }

    /// Computes the delay before a reconnect attempt
    ///
    /// # Arguments
    ///
    /// * `attempt` - Zero-based number of consecutive failed attempts
    ///
    /// # Returns
    ///
    /// `base_delay * multiplier^attempt`, capped at `max_delay`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// The single realtime subscription of a room view
///
/// Activating the same room twice, or a connection coming back up while
/// already subscribed, never issues a second `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    policy: ReconnectPolicy,
    topic: Option<Topic>,
    connected: bool,
    subscribed: bool,
    attempt: u32,
}

impl Subscription {
    /// Creates an inactive subscription
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            topic: None,
            connected: false,
            subscribed: false,
            attempt: 0,
        }
    }

    /// Returns the topic this view listens to, if active
    pub fn topic(&self) -> Option<&Topic> {
        self.topic.as_ref()
    }

    /// Checks if the view wants events
    pub fn is_active(&self) -> bool {
        self.topic.is_some()
    }

    /// Checks if the transport reported itself connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Checks if the subscription is established on a live connection
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Starts listening to a room
    ///
    /// A different active room is deactivated first.
    ///
    /// # Returns
    ///
    /// `false` if the room was already active and nothing was done
    pub fn activate(&mut self, channel: &impl Channel, endpoint: &str, room_id: &RoomId) -> bool {
        let topic = Topic::for_room(room_id);
        if self.topic.as_ref() == Some(&topic) {
            return false;
        }
        self.deactivate(channel);

        debug!(%topic, "activating realtime subscription");
        self.topic = Some(topic);
        channel.connect(endpoint);
        true
    }

    /// Records that the transport is connected and subscribes if needed
    ///
    /// A repeated notification for a connection already known to be up is
    /// ignored.
    pub fn on_connected(&mut self, channel: &impl Channel) {
        if self.connected {
            return;
        }
        self.connected = true;
        self.attempt = 0;
        if let Some(topic) = &self.topic
            && !self.subscribed
        {
            channel.subscribe(topic);
            self.subscribed = true;
        }
    }

    /// Records a transport drop
    ///
    /// # Returns
    ///
    /// The delay after which the transport should reconnect, or `None` if
    /// the view is no longer active
    pub fn on_disconnected(&mut self) -> Option<Duration> {
        self.connected = false;
        self.subscribed = false;
        self.topic.as_ref()?;

        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        debug!(attempt = self.attempt, ?delay, "scheduling realtime reconnect");
        Some(delay)
    }

    /// Stops listening and closes the transport
    pub fn deactivate(&mut self, channel: &impl Channel) {
        if let Some(topic) = self.topic.take() {
            if self.subscribed {
                channel.unsubscribe(&topic);
            }
            channel.disconnect();
            debug!(%topic, "deactivated realtime subscription");
        }
        self.connected = false;
        self.subscribed = false;
        self.attempt = 0;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc, str::FromStr};

    use super::*;

    /// Calls recorded by [`MockChannel`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Connect(String),
        Subscribe(String),
        Unsubscribe(String),
        Disconnect,
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockChannel {
        pub calls: Rc<RefCell<Vec<Call>>>,
    }

    impl MockChannel {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn subscribe_count(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| matches!(call, Call::Subscribe(_)))
                .count()
        }
    }

    impl Channel for MockChannel {
        fn connect(&self, endpoint: &str) {
            self.calls.borrow_mut().push(Call::Connect(endpoint.to_owned()));
        }

        fn subscribe(&self, topic: &Topic) {
            self.calls
                .borrow_mut()
                .push(Call::Subscribe(topic.as_str().to_owned()));
        }

        fn unsubscribe(&self, topic: &Topic) {
            self.calls
                .borrow_mut()
                .push(Call::Unsubscribe(topic.as_str().to_owned()));
        }

        fn disconnect(&self) {
            self.calls.borrow_mut().push(Call::Disconnect);
        }
    }

    fn room(id: &str) -> RoomId {
        RoomId::from_str(id).unwrap()
    }

    #[test]
    fn test_topic_for_room() {
        assert_eq!(Topic::for_room(&room("123456")).as_str(), "/topic/room/123456");
    }

    #[test]
    fn test_default_policy_backs_off_to_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(40));
        assert_eq!(policy.delay(4), Duration::from_secs(60));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_policy() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(5));
        assert_eq!(policy.delay(0), policy.delay(7));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_validation() {
        assert!(ReconnectPolicy::default().validate().is_ok());
        let zero = ReconnectPolicy {
            multiplier: 0,
            ..ReconnectPolicy::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_activate_then_connect_subscribes_once() {
        let channel = MockChannel::default();
        let mut subscription = Subscription::new(ReconnectPolicy::default());

        assert!(subscription.activate(&channel, "/ws", &room("123456")));
        assert!(!subscription.activate(&channel, "/ws", &room("123456")));
        subscription.on_connected(&channel);
        subscription.on_connected(&channel);

        assert_eq!(
            channel.calls(),
            [
                Call::Connect("/ws".to_owned()),
                Call::Subscribe("/topic/room/123456".to_owned()),
            ]
        );
        assert!(subscription.is_subscribed());
    }

    #[test]
    fn test_repeated_connected_keeps_backoff_state() {
        let channel = MockChannel::default();
        let mut subscription = Subscription::new(ReconnectPolicy::default());
        subscription.activate(&channel, "/ws", &room("123456"));
        subscription.on_connected(&channel);
        assert!(subscription.is_connected());

        subscription.on_disconnected();
        subscription.on_disconnected();
        subscription.on_connected(&channel);
        subscription.on_connected(&channel);

        assert_eq!(channel.subscribe_count(), 2);
        assert!(subscription.is_connected());
        assert_eq!(subscription.on_disconnected(), Some(Duration::from_secs(5)));
        assert!(!subscription.is_connected());
    }

    #[test]
    fn test_reconnect_resubscribes_exactly_once() {
        let channel = MockChannel::default();
        let mut subscription = Subscription::new(ReconnectPolicy::default());
        subscription.activate(&channel, "/ws", &room("123456"));
        subscription.on_connected(&channel);

        assert_eq!(subscription.on_disconnected(), Some(Duration::from_secs(5)));
        assert_eq!(subscription.on_disconnected(), Some(Duration::from_secs(10)));
        subscription.on_connected(&channel);
        subscription.on_connected(&channel);

        assert_eq!(channel.subscribe_count(), 2);
        assert_eq!(subscription.on_disconnected(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_switching_rooms_deactivates_previous() {
        let channel = MockChannel::default();
        let mut subscription = Subscription::new(ReconnectPolicy::default());
        subscription.activate(&channel, "/ws", &room("111111"));
        subscription.on_connected(&channel);

        subscription.activate(&channel, "/ws", &room("222222"));

        assert_eq!(
            channel.calls()[2..],
            [
                Call::Unsubscribe("/topic/room/111111".to_owned()),
                Call::Disconnect,
                Call::Connect("/ws".to_owned()),
            ]
        );
    }

    #[test]
    fn test_deactivate_stops_reconnects() {
        let channel = MockChannel::default();
        let mut subscription = Subscription::new(ReconnectPolicy::default());
        subscription.activate(&channel, "/ws", &room("123456"));

        subscription.deactivate(&channel);
        subscription.deactivate(&channel);

        assert_eq!(subscription.on_disconnected(), None);
        assert!(!subscription.is_active());
        assert_eq!(channel.calls(), [Call::Connect("/ws".to_owned()), Call::Disconnect]);
    }
}
