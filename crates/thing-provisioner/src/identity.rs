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

//! Identity values handed over by the authenticator after sign-in.
//!
//! The sign-in flow itself (and JWT signature validation) belongs to the
//! authenticator. This module only carries its results around: the opaque
//! [`IdentityToken`], the username read from that token, and the login map
//! handed to the credential exchange.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::ProvisioningError;

/// Claim the user pool puts the username under.
pub const USERNAME_CLAIM: &str = "cognito:username";

/// Opaque, short-lived credential proving a successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl IdentityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            secret: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: token.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_empty(&self) -> bool {
        self.secret.trim().is_empty()
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identifier issued by the identity pool for a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login provider -> identity token mapping.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Logins(BTreeMap<String, IdentityToken>);

impl Logins {
    pub fn single(provider: impl Into<String>, token: IdentityToken) -> Self {
        let mut logins = Self::default();
        logins.insert(provider, token);
        logins
    }

    pub fn insert(&mut self, provider: impl Into<String>, token: IdentityToken) {
        self.0.insert(provider.into(), token);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdentityToken)> {
        self.0.iter().map(|(provider, token)| (provider.as_str(), token))
    }
}

impl fmt::Debug for Logins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Provider keys are fine to log, tokens are not.
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// The result of a sign-in: who the user is, plus the token that proves it.
/// The token carries the `exp` claim so anything holding it can tell when
/// it stops being usable.
#[derive(Clone, Debug)]
pub struct SignedInUser {
    pub username: String,
    pub id_token: IdentityToken,
}

#[derive(Deserialize)]
struct IdTokenClaims {
    #[serde(rename = "cognito:username")]
    username: Option<String>,
    exp: Option<i64>,
}

impl SignedInUser {
    /// Read the username (and expiry, if present) out of a JWT identity token.
    ///
    /// Only the payload segment is decoded. The token is assumed to come
    /// straight from the authenticator, which already validated it.
    pub fn from_id_token(raw: &str) -> Result<Self, ProvisioningError> {
        let mut segments = raw.trim().split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_header), Some(payload), Some(_signature)) if segments.next().is_none() => {
                payload
            }
            _ => {
                return Err(ProvisioningError::token_decode(
                    "expected three dot-separated segments",
                ));
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ProvisioningError::token_decode(format!("payload is not base64url: {e}")))?;
        let claims: IdTokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| ProvisioningError::token_decode(format!("payload is not JSON: {e}")))?;

        let username = claims
            .username
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                ProvisioningError::token_decode(format!("missing {USERNAME_CLAIM} claim"))
            })?;
        let id_token = match claims
            .exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
        {
            Some(expires_at) => IdentityToken::with_expiry(raw.trim(), expires_at),
            None => IdentityToken::new(raw.trim()),
        };

        Ok(Self { username, id_token })
    }

    pub fn is_expired(&self) -> bool {
        self.id_token.is_expired_at(Utc::now())
    }
}
