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

// src/lib.rs
// Provisions a device identity for a signed-in user and connects it to the
// MQTT broker.

pub mod auth;
pub mod config;
pub mod errors;
pub mod identity;
pub mod messaging;
pub mod registry;
pub mod sequencer;

// Re-exports for convenience.
pub use auth::{ClientCredentials, CredentialsProvider, IdentityTokenProvider};
pub use config::ProvisionerConfig;
pub use errors::{ProvisioningError, ThingClientError};
pub use identity::{IdentityToken, Logins, PrincipalId, SignedInUser};
pub use messaging::{ConnectionStatus, ThingClient, ThingMessage, ThingTopics};
pub use registry::{CredentialExchange, DeviceRegistry, InMemoryCredentialExchange, InMemoryRegistry};
pub use rumqttc::QoS;
pub use sequencer::{
    AuthorizedIdentity, ProvisioningOutcome, ProvisioningSequencer, ProvisioningState,
    ProvisioningStep, StepReport, StepStatus,
};
