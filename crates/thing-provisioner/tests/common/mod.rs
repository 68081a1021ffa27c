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

// tests/common/mod.rs
// Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thing_provisioner::{ClientCredentials, CredentialsProvider, ProvisioningError};

// StaticCredentials hands out the same username and password forever.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: ClientCredentials,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: ClientCredentials {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn get_credentials(&self) -> Result<ClientCredentials, ProvisioningError> {
        Ok(self.credentials.clone())
    }
}

// make_jwt builds an unsigned identity token carrying `claims`.
pub fn make_jwt(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

// id_token_for returns a token for `username` that expires far in the future.
pub fn id_token_for(username: &str) -> String {
    make_jwt(serde_json::json!({
        "cognito:username": username,
        "exp": 4_000_000_000_i64,
    }))
}
