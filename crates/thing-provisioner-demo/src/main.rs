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

// src/main.rs
// End-to-end demo: take the identity token from a completed sign-in,
// provision a device for the user on a worker task, then connect as that
// device, subscribe to "<user>/from", publish a test message to
// "<user>/to", and disconnect.
//
// The registry and credential exchange used here are the in-process ones
// from thing_provisioner::registry; swap in cloud-backed implementations of
// DeviceRegistry and CredentialExchange to provision against a real account.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use thing_provisioner::{
    ConnectionStatus, InMemoryCredentialExchange, InMemoryRegistry, ProvisionerConfig,
    ProvisioningSequencer, SignedInUser, ThingClient,
};
use tokio::time::{Duration, sleep};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thing-provisioner-demo")]
#[command(about = "Provision a device for a signed-in user and exchange MQTT messages as it.", long_about = None)]
struct Cli {
    // Path to a TOML config file (THING_PROVISIONER_* env vars override it)
    #[arg(long)]
    config: Option<PathBuf>,

    // Identity token (JWT) returned by the sign-in flow
    #[arg(long, env = "THING_ID_TOKEN", hide_env_values = true)]
    id_token: String,

    // Stop after provisioning, without connecting to the broker
    #[arg(long)]
    provision_only: bool,

    // Seconds to wait for messages on "<user>/from" after publishing
    #[arg(long, default_value = "5")]
    listen_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(ProvisionerConfig::load(cli.config.as_deref())?);
    let user = SignedInUser::from_id_token(&cli.id_token)?;
    if user.is_expired() {
        return Err("identity token has expired; sign in again".into());
    }

    println!("Starting up");
    println!("  Broker: {}:{}", config.iot_endpoint, config.iot_port);
    println!("  Region: {}", config.region);
    println!("  User: {}", user.username);

    let registry = Arc::new(InMemoryRegistry::new());
    let exchange = Arc::new(InMemoryCredentialExchange::new(
        config.identity_pool_id.clone(),
    ));
    let sequencer = Arc::new(ProvisioningSequencer::new(
        config.clone(),
        registry,
        exchange,
    ));

    // Provisioning runs on its own task; we just wait for it to post back.
    let outcome = sequencer
        .spawn_ensure(user.username.clone(), user.id_token.clone())
        .await??;

    for failure in outcome.failures() {
        warn!(step = %failure.step, status = ?failure.status, "Provisioning step failed");
    }
    println!(
        "Provisioned device '{}' for principal {} ({:?})",
        outcome.identity.device_name, outcome.identity.principal_id, outcome.state
    );

    if cli.provision_only {
        return Ok(());
    }

    let client = ThingClient::new(&config, &outcome.identity).await?;
    let mut status = client.watch_status();
    let mut messages = client.subscribe_thing().await?;
    client.connect().await?;

    let timed_out = tokio::time::timeout(
        Duration::from_secs(30),
        status.wait_for(|s| {
            matches!(
                s,
                ConnectionStatus::Connected | ConnectionStatus::ConnectionLost
            )
        }),
    )
    .await
    .is_err();
    if client.status() != ConnectionStatus::Connected {
        error!(
            status = ?client.status(),
            timed_out,
            "Could not connect to broker"
        );
        return Err("could not connect to broker".into());
    }
    println!("Connected as '{}'", client.device_name());

    client.publish_test_message().await?;
    println!("Published test message to {}", client.topics().publish);

    println!(
        "Listening on {} for {}s",
        client.topics().subscribe,
        cli.listen_secs
    );
    let listen = sleep(Duration::from_secs(cli.listen_secs));
    tokio::pin!(listen);
    loop {
        tokio::select! {
            _ = &mut listen => break,
            received = messages.recv() => match received {
                Some(message) => match message.text() {
                    Ok(text) => info!("Message on {}: '{}'", message.topic, text),
                    Err(e) => error!("Message encoding error: {}", e),
                },
                None => break,
            },
        }
    }

    client.disconnect().await?;
    println!("Disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["thing-provisioner-demo", "--id-token", "a.b.c"]).unwrap();
        assert_eq!(cli.id_token, "a.b.c");
        assert_eq!(cli.listen_secs, 5);
        assert!(!cli.provision_only);
        assert!(cli.config.is_none());
    }
}
