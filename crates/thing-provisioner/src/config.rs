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

//! Static configuration for the provisioning sequencer and the thing client.
//!
//! Everything here is a plain value handed to [`crate::ProvisioningSequencer`]
//! and [`crate::ThingClient`] at construction time. [`ProvisionerConfig::load`]
//! reads an optional TOML file and overlays `THING_PROVISIONER_*` environment
//! variables on top of it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};

use crate::errors::ProvisioningError;

pub const DEFAULT_IOT_PORT: u16 = 8883;
pub const DEFAULT_POLICY_NAME: &str = "testpolicy";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);
pub const ENV_PREFIX: &str = "THING_PROVISIONER_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Hostname of the managed MQTT broker.
    pub iot_endpoint: String,

    #[serde(default = "default_iot_port")]
    pub iot_port: u16,

    pub region: String,

    /// Login provider key the identity token is filed under when exchanging
    /// it for a principal, e.g. `cognito-idp.<region>.amazonaws.com/<pool>`.
    pub user_pool_provider: String,

    pub identity_pool_id: String,

    /// Policy attached to every resolved principal.
    #[serde(default = "default_policy_name")]
    pub policy_name: String,

    #[serde(default = "default_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,

    /// PEM CA bundle for the broker. Plain TCP is used when unset.
    #[serde(default)]
    pub ca_certificate_path: Option<PathBuf>,
}

fn default_iot_port() -> u16 {
    DEFAULT_IOT_PORT
}

fn default_policy_name() -> String {
    DEFAULT_POLICY_NAME.to_string()
}

fn default_keep_alive() -> Duration {
    DEFAULT_KEEP_ALIVE
}

impl ProvisionerConfig {
    pub fn new(
        iot_endpoint: impl Into<String>,
        region: impl Into<String>,
        user_pool_provider: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            iot_endpoint: iot_endpoint.into(),
            iot_port: DEFAULT_IOT_PORT,
            region: region.into(),
            user_pool_provider: user_pool_provider.into(),
            identity_pool_id: identity_pool_id.into(),
            policy_name: default_policy_name(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            ca_certificate_path: None,
        }
    }

    pub fn with_iot_port(mut self, port: u16) -> Self {
        self.iot_port = port;
        self
    }

    pub fn with_policy_name(mut self, policy_name: impl Into<String>) -> Self {
        self.policy_name = policy_name.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_ca_certificate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certificate_path = Some(path.into());
        self
    }

    /// Load configuration from an optional TOML file, then apply
    /// `THING_PROVISIONER_*` environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ProvisioningError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ProvisioningError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProvisioningError> {
        let required = [
            ("iot_endpoint", &self.iot_endpoint),
            ("region", &self.region),
            ("user_pool_provider", &self.user_pool_provider),
            ("identity_pool_id", &self.identity_pool_id),
            ("policy_name", &self.policy_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProvisioningError::config_error(format!(
                    "{field} must not be empty"
                )));
            }
        }
        // rumqttc only accepts whole-second keep-alives.
        if self.keep_alive < Duration::from_secs(1) {
            return Err(ProvisioningError::config_error(
                "keep_alive must be at least one second",
            ));
        }
        Ok(())
    }
}
