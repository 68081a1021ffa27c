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

// src/registry/memory.rs
// Process-local registry and credential exchange. State lives behind a
// tokio RwLock and is never persisted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CredentialExchange, DeviceRegistry};
use crate::auth::{CredentialsProvider, IdentityTokenProvider, TokenCredentialsProvider};
use crate::errors::ProvisioningError;
use crate::identity::{IdentityToken, Logins, PrincipalId, SignedInUser};

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeSet<String>,
    // principal -> attached policy names
    policies: BTreeMap<PrincipalId, BTreeSet<String>>,
    // principal -> attached device names
    principal_devices: BTreeMap<PrincipalId, BTreeSet<String>>,
}

// InMemoryRegistry keeps device records and attachments in memory.
// Creating an existing device returns AlreadyExistsError; attaching
// something twice is a silent no-op, like the cloud registry.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        registry
            .state
            .write()
            .await
            .devices
            .extend(devices.into_iter().map(Into::into));
        registry
    }

    pub async fn has_device(&self, name: &str) -> bool {
        self.state.read().await.devices.contains(name)
    }

    pub async fn policies_for(&self, principal: &PrincipalId) -> Vec<String> {
        self.state
            .read()
            .await
            .policies
            .get(principal)
            .map(|policies| policies.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryRegistry {
    async fn list_devices(&self) -> Result<Vec<String>, ProvisioningError> {
        Ok(self.state.read().await.devices.iter().cloned().collect())
    }

    async fn create_device(&self, name: &str) -> Result<(), ProvisioningError> {
        let mut state = self.state.write().await;
        if !state.devices.insert(name.to_string()) {
            return Err(ProvisioningError::already_exists(format!("device {name}")));
        }
        debug!(device = %name, "Created device record");
        Ok(())
    }

    async fn list_principal_devices(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<String>, ProvisioningError> {
        Ok(self
            .state
            .read()
            .await
            .principal_devices
            .get(principal)
            .map(|devices| devices.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn attach_policy(
        &self,
        policy_name: &str,
        principal: &PrincipalId,
    ) -> Result<(), ProvisioningError> {
        self.state
            .write()
            .await
            .policies
            .entry(principal.clone())
            .or_default()
            .insert(policy_name.to_string());
        Ok(())
    }

    async fn attach_principal_to_device(
        &self,
        principal: &PrincipalId,
        device_name: &str,
    ) -> Result<(), ProvisioningError> {
        let mut state = self.state.write().await;
        if !state.devices.contains(device_name) {
            return Err(ProvisioningError::not_found(format!("device {device_name}")));
        }
        state
            .principal_devices
            .entry(principal.clone())
            .or_default()
            .insert(device_name.to_string());
        Ok(())
    }
}

// InMemoryCredentialExchange hands out principal ids P1, P2, ... in the
// order distinct users are first seen. A principal is keyed by login
// provider and the username claim of the identity token, so a refreshed
// token for the same user resolves to the same principal.
#[derive(Debug)]
pub struct InMemoryCredentialExchange {
    identity_pool_id: String,
    principals: RwLock<HashMap<String, PrincipalId>>,
}

impl InMemoryCredentialExchange {
    pub fn new(identity_pool_id: impl Into<String>) -> Self {
        Self {
            identity_pool_id: identity_pool_id.into(),
            principals: RwLock::new(HashMap::new()),
        }
    }

    fn first_login(logins: &Logins) -> Result<(&str, &IdentityToken), ProvisioningError> {
        logins
            .iter()
            .find(|(_, token)| !token.is_empty())
            .ok_or_else(|| ProvisioningError::not_authorized("no login supplied"))
    }

    fn principal_key(provider: &str, token: &IdentityToken) -> Result<String, ProvisioningError> {
        let user = SignedInUser::from_id_token(token.secret()).map_err(|err| {
            ProvisioningError::not_authorized(format!("login for {provider} rejected: {err}"))
        })?;
        Ok(format!("{provider}/{}", user.username))
    }
}

#[async_trait]
impl CredentialExchange for InMemoryCredentialExchange {
    async fn resolve_principal(
        &self,
        identity_pool_id: &str,
        logins: &Logins,
    ) -> Result<PrincipalId, ProvisioningError> {
        if identity_pool_id != self.identity_pool_id {
            return Err(ProvisioningError::not_found(format!(
                "identity pool {identity_pool_id}"
            )));
        }
        let (provider, token) = Self::first_login(logins)?;
        let key = Self::principal_key(provider, token)?;

        let mut principals = self.principals.write().await;
        let next_id = principals.len() + 1;
        let principal = principals
            .entry(key)
            .or_insert_with(|| PrincipalId::new(format!("P{next_id}")))
            .clone();
        Ok(principal)
    }

    async fn credentials_provider(
        &self,
        device_name: &str,
        logins: &Logins,
    ) -> Result<Arc<dyn CredentialsProvider>, ProvisioningError> {
        let (_, token) = Self::first_login(logins)?;
        Ok(Arc::new(TokenCredentialsProvider::new(
            device_name,
            IdentityTokenProvider::new(token.clone()),
        )))
    }
}
