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

// tests/client.rs
// Tests for ThingClient construction and lifecycle that don't need a
// running broker.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::StaticCredentials;
use thing_provisioner::{
    AuthorizedIdentity, ClientCredentials, ConnectionStatus, CredentialsProvider, PrincipalId,
    ProvisionerConfig, ProvisioningError, ThingClient, ThingClientError,
};

fn config() -> ProvisionerConfig {
    // Nothing listens on port 1, so connection attempts fail fast.
    ProvisionerConfig::new(
        "127.0.0.1",
        "ap-northeast-1",
        "cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_pool",
        "ap-northeast-1:identity-pool",
    )
    .with_iot_port(1)
}

fn identity() -> AuthorizedIdentity {
    AuthorizedIdentity {
        device_name: "alice".to_string(),
        principal_id: PrincipalId::new("P1"),
        credentials: Arc::new(StaticCredentials::new("alice", "token")),
    }
}

#[tokio::test]
async fn test_new_client_is_disconnected() {
    let client = ThingClient::new(&config(), &identity()).await.unwrap();

    assert_eq!(client.device_name(), "alice");
    assert_eq!(client.topics().publish, "alice/to");
    assert_eq!(client.topics().subscribe, "alice/from");
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_connect_twice_fails() {
    let client = ThingClient::new(&config(), &identity()).await.unwrap();

    client.connect().await.unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ThingClientError::AlreadyStartedError));
}

#[tokio::test]
async fn test_unreachable_broker_reports_reconnecting() {
    let client = ThingClient::new(&config(), &identity()).await.unwrap();
    let mut status = client.watch_status();

    client.connect().await.unwrap();
    let reached = tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| *s == ConnectionStatus::Reconnecting),
    )
    .await
    .is_ok_and(|waited| waited.is_ok());
    assert!(reached);
}

#[tokio::test]
async fn test_sub_second_keep_alive_is_rejected() {
    let config = config().with_keep_alive(Duration::from_millis(500));
    let result = ThingClient::new(&config, &identity()).await;
    assert!(
        matches!(result, Err(ThingClientError::ConfigError(ref msg)) if msg.contains("keep_alive")),
        "unexpected result: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn test_empty_device_name_is_rejected() {
    let identity = AuthorizedIdentity {
        device_name: String::new(),
        ..identity()
    };
    let result = ThingClient::new(&config(), &identity).await;
    assert!(matches!(result, Err(ThingClientError::ConfigError(_))));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_fetching_credentials() {
    let provider = Arc::new(OneShotCredentials::default());
    let identity = AuthorizedIdentity {
        credentials: provider.clone(),
        ..identity()
    };
    let mut config = config();
    config.iot_endpoint = String::new();

    let result = ThingClient::new(&config, &identity).await;
    assert!(matches!(result, Err(ThingClientError::ConfigError(_))));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_ca_certificate() {
    let config = config().with_ca_certificate_path("/nonexistent/AmazonRootCA1.pem");
    let result = ThingClient::new(&config, &identity()).await;
    assert!(matches!(result, Err(ThingClientError::TlsError(_))));
}

// ============================================================================
// Credentials Failures
// ============================================================================

#[derive(Debug)]
struct ExpiredCredentials;

#[async_trait]
impl CredentialsProvider for ExpiredCredentials {
    async fn get_credentials(&self) -> Result<ClientCredentials, ProvisioningError> {
        Err(ProvisioningError::credentials_error("identity token expired"))
    }
}

// OneShotCredentials succeeds for the first fetch (building the client)
// and fails for every refresh after that.
#[derive(Debug, Default)]
struct OneShotCredentials {
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialsProvider for OneShotCredentials {
    async fn get_credentials(&self) -> Result<ClientCredentials, ProvisioningError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(ClientCredentials {
                username: "alice".to_string(),
                password: "token".to_string(),
            })
        } else {
            Err(ProvisioningError::credentials_error("identity token expired"))
        }
    }
}

#[tokio::test]
async fn test_credentials_failure_surfaces_on_new() {
    let identity = AuthorizedIdentity {
        credentials: Arc::new(ExpiredCredentials),
        ..identity()
    };
    let result = ThingClient::new(&config(), &identity).await;
    assert!(matches!(
        result,
        Err(ThingClientError::CredentialsError(ProvisioningError::CredentialsError(_)))
    ));
}

#[tokio::test]
async fn test_refresh_failure_gives_up_and_drops_failed_subscription() {
    let provider = Arc::new(OneShotCredentials::default());
    let identity = AuthorizedIdentity {
        credentials: provider.clone(),
        ..identity()
    };
    let client = ThingClient::new(&config(), &identity).await.unwrap();
    let mut status = client.watch_status();

    client.connect().await.unwrap();
    let lost = tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| *s == ConnectionStatus::ConnectionLost),
    )
    .await
    .is_ok_and(|waited| waited.is_ok());
    assert!(lost);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    // The event loop is gone, so the subscribe can't be queued and must
    // not leave a queue behind for dispatch to match.
    let result = client.subscribe_thing().await;
    assert!(matches!(result, Err(ThingClientError::ConnectionError(_))));
    assert!(client.subscribed_filters().await.is_empty());
}

#[tokio::test]
async fn test_subscribed_filters_before_connect() {
    let client = ThingClient::new(&config(), &identity()).await.unwrap();

    let _thing = client.subscribe_thing().await.unwrap();
    let all = client.subscribe("alice/#").await.unwrap();
    let _again = client.subscribe("alice/from").await.unwrap();
    assert_eq!(client.subscribed_filters().await, vec!["alice/from", "alice/#"]);

    drop(all);
    assert_eq!(client.subscribed_filters().await, vec!["alice/from"]);
}
