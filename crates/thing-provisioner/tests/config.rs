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

// tests/config.rs
// Tests for loading ProvisionerConfig from a TOML file.

use std::io::Write;
use std::time::Duration;

use thing_provisioner::{ProvisionerConfig, ProvisioningError};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
        iot_endpoint = "example-ats.iot.ap-northeast-1.amazonaws.com"
        iot_port = 443
        region = "ap-northeast-1"
        user_pool_provider = "cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_pool"
        identity_pool_id = "ap-northeast-1:identity-pool"
        policy_name = "devicepolicy"
        keep_alive = "30s"
        ca_certificate_path = "/etc/ssl/AmazonRootCA1.pem"
        "#,
    );

    let config = ProvisionerConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.iot_endpoint, "example-ats.iot.ap-northeast-1.amazonaws.com");
    assert_eq!(config.iot_port, 443);
    assert_eq!(config.policy_name, "devicepolicy");
    assert_eq!(config.keep_alive, Duration::from_secs(30));
    assert_eq!(
        config.ca_certificate_path.as_deref(),
        Some(std::path::Path::new("/etc/ssl/AmazonRootCA1.pem"))
    );
}

#[test]
fn test_load_applies_defaults() {
    let file = write_config(
        r#"
        iot_endpoint = "example-ats.iot.ap-northeast-1.amazonaws.com"
        region = "ap-northeast-1"
        user_pool_provider = "cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_pool"
        identity_pool_id = "ap-northeast-1:identity-pool"
        "#,
    );

    let config = ProvisionerConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.iot_port, 8883);
    assert_eq!(config.policy_name, "testpolicy");
    assert_eq!(config.keep_alive, Duration::from_secs(10));
    assert!(config.ca_certificate_path.is_none());
}

#[test]
fn test_load_missing_required_field() {
    let file = write_config(
        r#"
        iot_endpoint = "example-ats.iot.ap-northeast-1.amazonaws.com"
        region = "ap-northeast-1"
        "#,
    );

    let err = ProvisionerConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ProvisioningError::ConfigError(_)));
}

#[test]
fn test_load_rejects_empty_values() {
    let file = write_config(
        r#"
        iot_endpoint = ""
        region = "ap-northeast-1"
        user_pool_provider = "cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_pool"
        identity_pool_id = "ap-northeast-1:identity-pool"
        "#,
    );

    let err = ProvisionerConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ProvisioningError::ConfigError(ref msg) if msg.contains("iot_endpoint")));
}
