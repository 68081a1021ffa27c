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

// src/errors.rs
// Error types for provisioning and for the thing messaging client.

use thiserror::Error;

// ProvisioningError covers everything that can go wrong while talking to
// the device registry and the credential exchange, plus the local input
// and configuration checks done before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    // TransientNetworkError occurs when a remote call could not complete
    // (timeouts, connection resets, throttling).
    #[error("Transient network error: {0}")]
    TransientNetworkError(String),
    // NotAuthorizedError occurs when the caller's credentials are not
    // allowed to perform the operation.
    #[error("Not authorized: {0}")]
    NotAuthorizedError(String),
    // NotFoundError occurs when the referenced device, principal or
    // policy does not exist in the registry.
    #[error("Not found: {0}")]
    NotFoundError(String),
    // AlreadyExistsError occurs when creating or attaching something
    // that is already there. The sequencer treats it as success.
    #[error("Already exists: {0}")]
    AlreadyExistsError(String),
    // InvalidInput occurs when ensure() is handed an empty username
    // or identity token.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    // TokenDecodeError occurs when an identity token cannot be parsed
    // or is missing the username claim.
    #[error("Identity token decode error: {0}")]
    TokenDecodeError(String),
    // CredentialsError occurs when a credentials provider cannot hand
    // out credentials (expired token, failed fetch).
    #[error("Credentials provider error: {0}")]
    CredentialsError(String),
    // ConfigError occurs when configuration cannot be loaded or fails
    // validation.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    // WorkerError occurs when the background provisioning task panics
    // or is cancelled before posting its result.
    #[error("Provisioning worker error: {0}")]
    WorkerError(String),
}

impl ProvisioningError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetworkError(message.into())
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorizedError(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFoundError(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExistsError(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn token_decode(message: impl Into<String>) -> Self {
        Self::TokenDecodeError(message.into())
    }

    pub fn credentials_error(message: impl Into<String>) -> Self {
        Self::CredentialsError(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    // Check if this error is an "already there" condition, which the
    // idempotent provisioning steps count as success.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExistsError(_))
    }

    // Check if retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetworkError(_))
    }
}

impl From<figment::Error> for ProvisioningError {
    fn from(err: figment::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProvisioningError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::WorkerError(err.to_string())
    }
}

// ThingClientError covers failures of the MQTT client used by a
// provisioned thing.
#[derive(Error, Debug)]
pub enum ThingClientError {
    // ConnectionError occurs when MQTT broker communication fails.
    #[error("MQTT connection error: {0}")]
    ConnectionError(#[from] rumqttc::ClientError),
    // CredentialsError occurs when the identity's credentials provider
    // fails while building or refreshing the connection.
    #[error("Credentials error: {0}")]
    CredentialsError(#[from] ProvisioningError),
    // ConfigError occurs when the configuration handed to the client
    // fails validation (e.g. a sub-second keep-alive).
    #[error("Client configuration error: {0}")]
    ConfigError(String),
    // TlsError occurs when the configured CA certificate can't be read.
    #[error("TLS configuration error: {0}")]
    TlsError(#[from] std::io::Error),
    // InvalidUtf8 occurs when a received payload is not valid text.
    #[error("Invalid UTF-8 encoding: {0}")]
    InvalidUtf8(String),
    // AlreadyStartedError occurs when connect() has already
    // been called on the client.
    #[error("Already started error: connect() has already been called on the client")]
    AlreadyStartedError,
}

impl ThingClientError {
    pub fn invalid_utf8(message: impl Into<String>) -> Self {
        Self::InvalidUtf8(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}
