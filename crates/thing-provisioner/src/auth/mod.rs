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

//! Credentials handles for a provisioned thing.
//!
//! - [`CredentialsProvider`]: Trait for providers that supply username + password
//! - [`TokenProvider`]: Trait for providers that supply only a token
//! - [`TokenCredentialsProvider`]: Combines a [`TokenProvider`] with a fixed username
//! - [`IdentityTokenProvider`]: A [`TokenProvider`] over a signed-in user's identity token
//!
//! An [`crate::AuthorizedIdentity`] carries one of these as an
//! `Arc<dyn CredentialsProvider>`, which [`crate::ThingClient`] asks for fresh
//! credentials on every (re)connect.

mod traits;

pub use traits::{
    ClientCredentials, CredentialsProvider, IdentityTokenProvider, TokenCredentialsProvider,
    TokenProvider,
};
