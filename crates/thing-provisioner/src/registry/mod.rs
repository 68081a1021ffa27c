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

//! Seams to the external device registry and credential exchange.
//!
//! The sequencer only ever talks to these traits. Cloud-backed
//! implementations live with the caller; [`InMemoryRegistry`] and
//! [`InMemoryCredentialExchange`] keep the same contract inside the process.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::CredentialsProvider;
use crate::errors::ProvisioningError;
use crate::identity::{Logins, PrincipalId};

mod memory;

pub use memory::{InMemoryCredentialExchange, InMemoryRegistry};

/// The registry of connectable devices ("things") and their attachments.
///
/// Every call is a blocking round trip from the sequencer's point of view.
/// Implementations report "already there" conditions as
/// [`ProvisioningError::AlreadyExistsError`]; the sequencer counts those
/// as success.
#[async_trait]
pub trait DeviceRegistry: Send + Sync + std::fmt::Debug {
    /// Names of every device record in the registry.
    async fn list_devices(&self) -> Result<Vec<String>, ProvisioningError>;

    async fn create_device(&self, name: &str) -> Result<(), ProvisioningError>;

    /// Names of the devices `principal` is attached to.
    async fn list_principal_devices(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<String>, ProvisioningError>;

    async fn attach_policy(
        &self,
        policy_name: &str,
        principal: &PrincipalId,
    ) -> Result<(), ProvisioningError>;

    async fn attach_principal_to_device(
        &self,
        principal: &PrincipalId,
        device_name: &str,
    ) -> Result<(), ProvisioningError>;
}

/// Exchanges a signed-in user's logins for a principal and for
/// connection credentials.
#[async_trait]
pub trait CredentialExchange: Send + Sync + std::fmt::Debug {
    async fn resolve_principal(
        &self,
        identity_pool_id: &str,
        logins: &Logins,
    ) -> Result<PrincipalId, ProvisioningError>;

    /// Credentials the device named `device_name` should present to the broker.
    async fn credentials_provider(
        &self,
        device_name: &str,
        logins: &Logins,
    ) -> Result<Arc<dyn CredentialsProvider>, ProvisioningError>;
}
