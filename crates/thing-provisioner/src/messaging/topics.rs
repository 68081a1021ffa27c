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

// src/messaging/topics.rs
// Topic naming for a provisioned thing, and MQTT topic filter matching.

use rumqttc::QoS;

pub const THING_QOS: QoS = QoS::AtLeastOnce;
pub const TEST_MESSAGE: &str = r#"{"message":"Test."}"#;

// ThingTopics are the per-device topics: the device publishes on
// "<name>/to" and listens on "<name>/from".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThingTopics {
    pub publish: String,
    pub subscribe: String,
}

impl ThingTopics {
    pub fn for_device(device_name: &str) -> Self {
        Self {
            publish: format!("{device_name}/to"),
            subscribe: format!("{device_name}/from"),
        }
    }
}

// topic_matches checks a concrete topic against a subscription filter,
// honouring the single-level (+) and multi-level (#) wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
