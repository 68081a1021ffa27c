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

//! Traits for pluggable credential providers.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::ProvisioningError;
use crate::identity::IdentityToken;

// ClientCredentials are the username and password presented to the
// MQTT broker.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A provider that can supply broker credentials (username + password).
///
/// Implementations may fetch credentials from anywhere and are expected to
/// handle caching and refresh themselves.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Get the current credentials for MQTT authentication.
    async fn get_credentials(&self) -> Result<ClientCredentials, ProvisioningError>;
}

/// A provider that supplies only a token/password. Pair it with a username
/// through [`TokenCredentialsProvider`].
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    async fn get_token(&self) -> Result<String, ProvisioningError>;
}

/// Combines a [`TokenProvider`] with a fixed username to create a [`CredentialsProvider`].
#[derive(Debug)]
pub struct TokenCredentialsProvider<T: TokenProvider> {
    token_provider: T,
    username: String,
}

impl<T: TokenProvider> TokenCredentialsProvider<T> {
    /// * `username` - The fixed username to use for MQTT authentication
    /// * `token_provider` - The provider that fetches tokens
    pub fn new(username: impl Into<String>, token_provider: T) -> Self {
        Self {
            token_provider,
            username: username.into(),
        }
    }
}

#[async_trait]
impl<T: TokenProvider> CredentialsProvider for TokenCredentialsProvider<T> {
    async fn get_credentials(&self) -> Result<ClientCredentials, ProvisioningError> {
        let password = self.token_provider.get_token().await?;
        Ok(ClientCredentials {
            username: self.username.clone(),
            password,
        })
    }
}

/// Hands out a signed-in user's identity token until it expires.
///
/// There is no refresh here: once the token is past its expiry the user has
/// to sign in again, so the provider reports a [`ProvisioningError::CredentialsError`].
#[derive(Clone, Debug)]
pub struct IdentityTokenProvider {
    token: IdentityToken,
}

impl IdentityTokenProvider {
    pub fn new(token: IdentityToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for IdentityTokenProvider {
    async fn get_token(&self) -> Result<String, ProvisioningError> {
        if let Some(expires_at) = self.token.expires_at()
            && self.token.is_expired_at(Utc::now())
        {
            return Err(ProvisioningError::credentials_error(format!(
                "identity token expired at {expires_at}; sign in again"
            )));
        }
        Ok(self.token.secret().to_string())
    }
}
