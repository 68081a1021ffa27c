/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

// src/messaging/client.rs
// MQTT client for a provisioned thing.
//
// Wire framing, TLS and keep-alive are rumqttc's business. This client only
// connects as the AuthorizedIdentity, tracks the connection status for the
// caller, fans incoming publishes out to per-subscription queues, and
// refreshes credentials from the identity's provider before each reconnect.
// The session is persistent; if the broker still comes back without one
// after a reconnect, every known filter is subscribed again.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Transport};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tracing::{debug, error, info, warn};

use super::topics::{TEST_MESSAGE, THING_QOS, ThingTopics, topic_matches};
use crate::auth::CredentialsProvider;
use crate::config::ProvisionerConfig;
use crate::errors::ThingClientError;
use crate::sequencer::AuthorizedIdentity;

const DEFAULT_MESSAGE_CHANNEL_CAPACITY: usize = 100;
const DEFAULT_SUBSCRIPTION_QUEUE_SIZE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    // ConnectionLost means the client gave up: it can't get fresh
    // credentials, so the user has to sign in again.
    ConnectionLost,
    Disconnected,
}

// ThingMessage is a publish received on one of our subscriptions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl ThingMessage {
    pub fn text(&self) -> Result<&str, ThingClientError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| ThingClientError::invalid_utf8(format!("topic {}: {e}", self.topic)))
    }
}

type Subscriptions = Arc<RwLock<Vec<(String, mpsc::Sender<ThingMessage>)>>>;

pub struct ThingClient {
    client: AsyncClient,
    device_name: String,
    topics: ThingTopics,
    // event_loop is taken by connect(); None afterwards.
    event_loop: Mutex<Option<EventLoop>>,
    credentials: Arc<dyn CredentialsProvider>,
    subscriptions: Subscriptions,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl ThingClient {
    // new builds (but does not connect) a client for the provisioned
    // identity. Async because the first set of credentials is fetched here.
    pub async fn new(
        config: &ProvisionerConfig,
        identity: &AuthorizedIdentity,
    ) -> Result<Arc<Self>, ThingClientError> {
        config
            .validate()
            .map_err(|e| ThingClientError::config_error(e.to_string()))?;
        // The device name is the client id of a persistent session.
        if identity.device_name.trim().is_empty() {
            return Err(ThingClientError::config_error("device name must not be empty"));
        }

        let mut mqtt_options = MqttOptions::new(
            identity.device_name.as_str(),
            config.iot_endpoint.as_str(),
            config.iot_port,
        );
        mqtt_options.set_keep_alive(config.keep_alive);
        mqtt_options.set_clean_session(false);

        let credentials = identity.credentials.get_credentials().await?;
        mqtt_options.set_credentials(credentials.username, credentials.password);

        if let Some(ca_path) = &config.ca_certificate_path {
            let ca_certificate = tokio::fs::read(ca_path).await?;
            mqtt_options.set_transport(Transport::tls(ca_certificate, None, None));
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, DEFAULT_MESSAGE_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);

        info!(
            device = %identity.device_name,
            "Created MQTT client for {}:{}",
            config.iot_endpoint,
            config.iot_port
        );

        Ok(Arc::new(Self {
            client,
            device_name: identity.device_name.clone(),
            topics: ThingTopics::for_device(&identity.device_name),
            event_loop: Mutex::new(Some(event_loop)),
            credentials: identity.credentials.clone(),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            status_tx: Arc::new(status_tx),
        }))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn topics(&self) -> &ThingTopics {
        &self.topics
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    // connect starts the event loop task. It may only be called once.
    pub async fn connect(&self) -> Result<(), ThingClientError> {
        let mut event_loop = self
            .event_loop
            .lock()
            .await
            .take()
            .ok_or(ThingClientError::AlreadyStartedError)?;

        self.status_tx.send_replace(ConnectionStatus::Connecting);

        let client = self.client.clone();
        let status_tx = self.status_tx.clone();
        let subscriptions = self.subscriptions.clone();
        let credentials = self.credentials.clone();
        let device_name = self.device_name.clone();
        let mut backoff = SuperBasicBackoff::new();
        let mut session = SessionTracker::default();

        tokio::spawn(async move {
            let final_status = loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                        info!(
                            device = %device_name,
                            session_present = connack.session_present,
                            "Connected to MQTT broker"
                        );
                        if session.on_connack(connack.session_present) {
                            resubscribe(&client, &subscriptions, &device_name).await;
                        }
                        status_tx.send_replace(ConnectionStatus::Connected);
                        backoff.reset();
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = ThingMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        };
                        dispatch(&subscriptions, message).await;
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        info!(device = %device_name, "MQTT client disconnected");
                        break ConnectionStatus::Disconnected;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(device = %device_name, "MQTT event loop connection error: {:?}", e);
                        status_tx.send_replace(ConnectionStatus::Reconnecting);

                        match credentials.get_credentials().await {
                            Ok(fresh) => {
                                debug!(device = %device_name, "Refreshed credentials for reconnection");
                                event_loop
                                    .mqtt_options
                                    .set_credentials(fresh.username, fresh.password);
                            }
                            Err(cred_err) => {
                                error!(
                                    device = %device_name,
                                    "Failed to refresh credentials, giving up: {}",
                                    cred_err
                                );
                                break ConnectionStatus::ConnectionLost;
                            }
                        }

                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
            };
            // Close the request channel before reporting, so callers that
            // see the final status also see client calls fail.
            drop(event_loop);
            status_tx.send_replace(final_status);
        });

        Ok(())
    }

    // subscribe subscribes to `filter` and returns a queue of the messages
    // that match it. When the queue is full new messages are dropped.
    //
    // The queue is registered before the request goes out so nothing that
    // arrives right after the SubAck is missed; it is removed again if the
    // request can't be queued.
    pub async fn subscribe(
        &self,
        filter: &str,
    ) -> Result<mpsc::Receiver<ThingMessage>, ThingClientError> {
        let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIPTION_QUEUE_SIZE);
        self.subscriptions
            .write()
            .await
            .push((filter.to_string(), tx.clone()));

        if let Err(e) = self.client.subscribe(filter, THING_QOS).await {
            self.subscriptions
                .write()
                .await
                .retain(|(_, existing)| !existing.same_channel(&tx));
            warn!("Subscribe to topic {} failed: {}", filter, e);
            return Err(e.into());
        }
        info!("Subscribed to topic: {} (QoS: {:?})", filter, THING_QOS);
        Ok(rx)
    }

    // subscribed_filters lists the distinct filters with a live queue.
    pub async fn subscribed_filters(&self) -> Vec<String> {
        active_filters(&self.subscriptions).await
    }

    pub async fn subscribe_thing(&self) -> Result<mpsc::Receiver<ThingMessage>, ThingClientError> {
        self.subscribe(&self.topics.subscribe).await
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ThingClientError> {
        self.client.publish(topic, THING_QOS, false, payload).await?;
        debug!("Published message to topic: {}", topic);
        Ok(())
    }

    pub async fn publish_test_message(&self) -> Result<(), ThingClientError> {
        self.publish(&self.topics.publish, TEST_MESSAGE.as_bytes().to_vec())
            .await
    }

    pub async fn disconnect(&self) -> Result<(), ThingClientError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

async fn dispatch(subscriptions: &Subscriptions, message: ThingMessage) {
    let subscriptions = subscriptions.read().await;
    let mut matched = false;
    for (filter, tx) in subscriptions.iter() {
        if !topic_matches(filter, &message.topic) {
            continue;
        }
        matched = true;
        if tx.try_send(message.clone()).is_err() {
            warn!(
                "Subscription queue for '{}' full or closed, dropping message from topic: {}",
                filter, message.topic
            );
        }
    }
    if !matched {
        warn!("No subscription matched topic: {}", message.topic);
    }
}

async fn active_filters(subscriptions: &Subscriptions) -> Vec<String> {
    let mut filters: Vec<String> = Vec::new();
    for (filter, tx) in subscriptions.read().await.iter() {
        if !tx.is_closed() && !filters.contains(filter) {
            filters.push(filter.clone());
        }
    }
    filters
}

// resubscribe queues a subscribe for every active filter. It runs on the
// event loop task, so it must not wait for room in the request channel.
async fn resubscribe(client: &AsyncClient, subscriptions: &Subscriptions, device_name: &str) {
    for filter in active_filters(subscriptions).await {
        match client.try_subscribe(filter.as_str(), THING_QOS) {
            Ok(()) => debug!(device = %device_name, "Resubscribed to topic: {}", filter),
            Err(e) => error!(device = %device_name, "Failed to resubscribe to {}: {}", filter, e),
        }
    }
}

// SessionTracker decides, per ConnAck, whether the broker-side
// subscriptions have to be replayed. The first ConnAck never needs it:
// subscribe requests made before then are still queued in the client.
#[derive(Debug, Default)]
struct SessionTracker {
    connected_before: bool,
}

impl SessionTracker {
    fn on_connack(&mut self, session_present: bool) -> bool {
        let reconnect = std::mem::replace(&mut self.connected_before, true);
        reconnect && !session_present
    }
}

// SuperBasicBackoff backs off reconnect attempts, starting at 100ms
// and doubling up to 30 seconds.
struct SuperBasicBackoff {
    current: Duration,
    max: Duration,
}

impl SuperBasicBackoff {
    fn new() -> Self {
        Self {
            current: Duration::from_millis(100),
            max: Duration::from_secs(30),
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        warn!("Reconnect backoff updated: {}ms", delay.as_millis());
        delay
    }

    fn reset(&mut self) {
        self.current = Duration::from_millis(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = SuperBasicBackoff::new();
        let delays: Vec<u128> = (0..12).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(&delays[..4], &[100, 200, 400, 800]);
        assert_eq!(*delays.last().unwrap(), 30_000);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_message_text() {
        let message = ThingMessage {
            topic: "alice/from".into(),
            payload: br#"{"message":"hi"}"#.to_vec(),
        };
        assert_eq!(message.text().unwrap(), r#"{"message":"hi"}"#);

        let binary = ThingMessage {
            topic: "alice/from".into(),
            payload: vec![0xff, 0xfe],
        };
        assert!(matches!(binary.text(), Err(ThingClientError::InvalidUtf8(_))));
    }

    #[test]
    fn test_session_tracker_replays_only_after_lost_session() {
        let mut session = SessionTracker::default();
        // First connect: pending subscribes are still in the request queue.
        assert!(!session.on_connack(false));
        // Broker kept the session.
        assert!(!session.on_connack(true));
        // Broker dropped it.
        assert!(session.on_connack(false));
        assert!(session.on_connack(false));
    }

    #[tokio::test]
    async fn test_active_filters_skips_closed_and_duplicates() {
        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let (from_tx, _from_rx) = mpsc::channel(1);
        let (dup_tx, _dup_rx) = mpsc::channel(1);
        let (gone_tx, gone_rx) = mpsc::channel(1);
        drop(gone_rx);
        {
            let mut guard = subscriptions.write().await;
            guard.push(("alice/from".to_string(), from_tx));
            guard.push(("alice/old".to_string(), gone_tx));
            guard.push(("alice/from".to_string(), dup_tx));
        }

        assert_eq!(active_filters(&subscriptions).await, vec!["alice/from"]);
    }

    #[tokio::test]
    async fn test_resubscribe_queues_every_active_filter() {
        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let (from_tx, _from_rx) = mpsc::channel(1);
        let (all_tx, _all_rx) = mpsc::channel(1);
        {
            let mut guard = subscriptions.write().await;
            guard.push(("alice/from".to_string(), from_tx));
            guard.push(("alice/#".to_string(), all_tx));
        }

        // Room for exactly the two replayed subscribes.
        let (client, event_loop) =
            AsyncClient::new(MqttOptions::new("alice", "localhost", 8883), 2);
        resubscribe(&client, &subscriptions, "alice").await;
        assert!(client.try_subscribe("alice/extra", THING_QOS).is_err());

        drop(event_loop);
        // With the request channel gone nothing can be queued; the replay
        // logs and carries on.
        resubscribe(&client, &subscriptions, "alice").await;
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_filter() {
        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let (from_tx, mut from_rx) = mpsc::channel(4);
        let (all_tx, mut all_rx) = mpsc::channel(4);
        {
            let mut guard = subscriptions.write().await;
            guard.push(("alice/from".to_string(), from_tx));
            guard.push(("alice/#".to_string(), all_tx));
        }

        let message = ThingMessage {
            topic: "alice/from".into(),
            payload: b"one".to_vec(),
        };
        dispatch(&subscriptions, message.clone()).await;
        dispatch(
            &subscriptions,
            ThingMessage {
                topic: "alice/other".into(),
                payload: b"two".to_vec(),
            },
        )
        .await;

        assert_eq!(from_rx.try_recv().unwrap(), message);
        assert!(from_rx.try_recv().is_err());
        assert_eq!(all_rx.try_recv().unwrap(), message);
        assert_eq!(all_rx.try_recv().unwrap().payload, b"two");
    }
}
