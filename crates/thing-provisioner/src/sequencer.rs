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

// src/sequencer.rs
// Device provisioning sequencer.
//
// Given a signed-in user, make sure a device record named after them exists,
// resolve their principal, make sure that principal carries the access policy
// and is attached to the device, and hand back an AuthorizedIdentity the
// messaging client can connect with.
//
// Every step is checked before it is acted on, so calling ensure() again with
// the same inputs re-checks instead of failing on "already exists", and any
// step that failed last time is simply attempted again. Only principal
// resolution is fatal; every other failure is logged, recorded in the
// returned outcome, and the sequence carries on.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialsProvider;
use crate::config::ProvisionerConfig;
use crate::errors::ProvisioningError;
use crate::identity::{IdentityToken, Logins, PrincipalId};
use crate::registry::{CredentialExchange, DeviceRegistry};

/// How far provisioning got. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisioningState {
    Unchecked,
    DeviceEnsured,
    PrincipalAttached,
    Authorized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisioningStep {
    ListDevices,
    CreateDevice,
    ResolvePrincipal,
    ListPrincipalDevices,
    AttachPolicy,
    AttachPrincipal,
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListDevices => "list_devices",
            Self::CreateDevice => "create_device",
            Self::ResolvePrincipal => "resolve_principal",
            Self::ListPrincipalDevices => "list_principal_devices",
            Self::AttachPolicy => "attach_policy",
            Self::AttachPrincipal => "attach_principal",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The registry already had what this step would have created.
    AlreadySatisfied,
    Completed,
    Failed(ProvisioningError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub step: ProvisioningStep,
    pub status: StepStatus,
}

impl StepReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, StepStatus::Failed(_))
    }
}

/// Everything a messaging client needs to connect as the provisioned device.
#[derive(Clone)]
pub struct AuthorizedIdentity {
    pub device_name: String,
    pub principal_id: PrincipalId,
    pub credentials: Arc<dyn CredentialsProvider>,
}

impl fmt::Debug for AuthorizedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedIdentity")
            .field("device_name", &self.device_name)
            .field("principal_id", &self.principal_id)
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ProvisioningOutcome {
    pub identity: AuthorizedIdentity,
    pub state: ProvisioningState,
    pub steps: Vec<StepReport>,
}

impl ProvisioningOutcome {
    /// True when the device, the policy and the principal attachment were
    /// all confirmed on this pass. A failed listing that a later step made up
    /// for still counts.
    pub fn is_authorized(&self) -> bool {
        self.state == ProvisioningState::Authorized
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|report| report.is_failed())
    }

    /// Steps that changed registry state on this pass.
    pub fn changes(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|report| report.status == StepStatus::Completed)
            .filter(|report| {
                matches!(
                    report.step,
                    ProvisioningStep::CreateDevice
                        | ProvisioningStep::AttachPolicy
                        | ProvisioningStep::AttachPrincipal
                )
            })
    }
}

pub struct ProvisioningSequencer {
    config: Arc<ProvisionerConfig>,
    registry: Arc<dyn DeviceRegistry>,
    exchange: Arc<dyn CredentialExchange>,
}

impl fmt::Debug for ProvisioningSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningSequencer")
            .field("identity_pool_id", &self.config.identity_pool_id)
            .field("policy_name", &self.config.policy_name)
            .field("registry", &self.registry)
            .field("exchange", &self.exchange)
            .finish()
    }
}

impl ProvisioningSequencer {
    pub fn new(
        config: Arc<ProvisionerConfig>,
        registry: Arc<dyn DeviceRegistry>,
        exchange: Arc<dyn CredentialExchange>,
    ) -> Self {
        Self {
            config,
            registry,
            exchange,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    // spawn_ensure runs ensure() as a single task off the caller's context
    // and hands back the handle; awaiting it is the caller's continuation.
    pub fn spawn_ensure(
        self: &Arc<Self>,
        username: impl Into<String>,
        token: IdentityToken,
    ) -> JoinHandle<Result<ProvisioningOutcome, ProvisioningError>> {
        let sequencer = self.clone();
        let username = username.into();
        tokio::spawn(async move { sequencer.ensure(&username, &token).await })
    }

    pub async fn ensure(
        &self,
        username: &str,
        token: &IdentityToken,
    ) -> Result<ProvisioningOutcome, ProvisioningError> {
        if username.trim().is_empty() {
            return Err(ProvisioningError::invalid_input("username must not be empty"));
        }
        if token.is_empty() {
            return Err(ProvisioningError::invalid_input(
                "identity token must not be empty",
            ));
        }

        info!(device = %username, "Provisioning device");
        let mut steps = Vec::new();

        let device_ok = self.ensure_device(username, &mut steps).await;

        let logins = Logins::single(self.config.user_pool_provider.clone(), token.clone());
        let principal_id = match self
            .exchange
            .resolve_principal(&self.config.identity_pool_id, &logins)
            .await
        {
            Ok(principal_id) => principal_id,
            Err(e) => {
                error!(device = %username, error = %e, "Could not resolve principal");
                return Err(e);
            }
        };
        let credentials = self
            .exchange
            .credentials_provider(username, &logins)
            .await
            .inspect_err(|e| {
                error!(device = %username, error = %e, "Could not obtain credentials");
            })?;
        steps.push(StepReport {
            step: ProvisioningStep::ResolvePrincipal,
            status: StepStatus::Completed,
        });
        debug!(device = %username, principal = %principal_id, "Resolved principal");

        let (principal_ok, policy_ok) = self
            .ensure_attached(username, &principal_id, &mut steps)
            .await;

        let state = match (device_ok, principal_ok, policy_ok) {
            (false, _, _) => ProvisioningState::Unchecked,
            (true, false, _) => ProvisioningState::DeviceEnsured,
            (true, true, false) => ProvisioningState::PrincipalAttached,
            (true, true, true) => ProvisioningState::Authorized,
        };

        let outcome = ProvisioningOutcome {
            identity: AuthorizedIdentity {
                device_name: username.to_string(),
                principal_id,
                credentials,
            },
            state,
            steps,
        };

        if outcome.is_authorized() {
            info!(
                device = %outcome.identity.device_name,
                principal = %outcome.identity.principal_id,
                changes = outcome.changes().count(),
                "Device provisioned"
            );
        } else {
            warn!(
                device = %outcome.identity.device_name,
                principal = %outcome.identity.principal_id,
                state = ?outcome.state,
                failures = outcome.failures().count(),
                "Device provisioned with failed steps; calling ensure again will retry them"
            );
        }
        Ok(outcome)
    }

    // ensure_device makes sure a device record named `name` exists.
    // A failed listing falls through to a create attempt, since an
    // AlreadyExists answer from create settles the question too.
    async fn ensure_device(&self, name: &str, steps: &mut Vec<StepReport>) -> bool {
        let listed = match self.registry.list_devices().await {
            Ok(devices) => {
                steps.push(StepReport {
                    step: ProvisioningStep::ListDevices,
                    status: StepStatus::Completed,
                });
                Some(devices.iter().any(|device| device == name))
            }
            Err(e) => {
                warn!(device = %name, error = %e, "Could not list devices");
                steps.push(StepReport {
                    step: ProvisioningStep::ListDevices,
                    status: StepStatus::Failed(e),
                });
                None
            }
        };

        if listed == Some(true) {
            steps.push(StepReport {
                step: ProvisioningStep::CreateDevice,
                status: StepStatus::AlreadySatisfied,
            });
            return true;
        }

        let status = self
            .best_effort(ProvisioningStep::CreateDevice, name, || {
                self.registry.create_device(name)
            })
            .await;
        let created = !matches!(status, StepStatus::Failed(_));
        steps.push(StepReport {
            step: ProvisioningStep::CreateDevice,
            status,
        });
        created
    }

    // ensure_attached makes sure `principal` carries the policy and is
    // attached to `device`. Returns (principal attached, policy attached).
    async fn ensure_attached(
        &self,
        device: &str,
        principal: &PrincipalId,
        steps: &mut Vec<StepReport>,
    ) -> (bool, bool) {
        match self.registry.list_principal_devices(principal).await {
            Ok(devices) => {
                steps.push(StepReport {
                    step: ProvisioningStep::ListPrincipalDevices,
                    status: StepStatus::Completed,
                });
                if devices.iter().any(|attached| attached == device) {
                    for step in [ProvisioningStep::AttachPolicy, ProvisioningStep::AttachPrincipal] {
                        steps.push(StepReport {
                            step,
                            status: StepStatus::AlreadySatisfied,
                        });
                    }
                    return (true, true);
                }
            }
            Err(e) => {
                warn!(
                    device = %device,
                    principal = %principal,
                    error = %e,
                    "Could not list principal devices"
                );
                steps.push(StepReport {
                    step: ProvisioningStep::ListPrincipalDevices,
                    status: StepStatus::Failed(e),
                });
            }
        }

        // Both attachments are attempted regardless of each other's result.
        let policy_name = self.config.policy_name.as_str();
        let policy_status = self
            .best_effort(ProvisioningStep::AttachPolicy, device, || {
                self.registry.attach_policy(policy_name, principal)
            })
            .await;
        let principal_status = self
            .best_effort(ProvisioningStep::AttachPrincipal, device, || {
                self.registry.attach_principal_to_device(principal, device)
            })
            .await;

        let policy_ok = !matches!(policy_status, StepStatus::Failed(_));
        let principal_ok = !matches!(principal_status, StepStatus::Failed(_));
        steps.push(StepReport {
            step: ProvisioningStep::AttachPolicy,
            status: policy_status,
        });
        steps.push(StepReport {
            step: ProvisioningStep::AttachPrincipal,
            status: principal_status,
        });
        (principal_ok, policy_ok)
    }

    // best_effort runs one mutating registry call, mapping AlreadyExists to
    // AlreadySatisfied and logging (not propagating) anything else.
    async fn best_effort<F, Fut>(
        &self,
        step: ProvisioningStep,
        device: &str,
        call: F,
    ) -> StepStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ProvisioningError>>,
    {
        match call().await {
            Ok(()) => {
                debug!(device = %device, step = %step, "Provisioning step completed");
                StepStatus::Completed
            }
            Err(e) if e.is_already_exists() => {
                debug!(device = %device, step = %step, "Provisioning step already satisfied");
                StepStatus::AlreadySatisfied
            }
            Err(e) => {
                error!(
                    device = %device,
                    step = %step,
                    transient = e.is_transient(),
                    error = %e,
                    "Provisioning step failed"
                );
                StepStatus::Failed(e)
            }
        }
    }
}
