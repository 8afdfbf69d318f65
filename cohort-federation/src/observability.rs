/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Structured event names and field formatters used with `tracing`.

pub mod events {
    pub const COORDINATOR_CREATED: &str = "coordinator_created";

    pub const ANNOUNCE_JOIN: &str = "announce_join";
    pub const ANNOUNCE_JOIN_HEARTBEAT: &str = "announce_join_heartbeat";
    pub const ANNOUNCE_JOIN_REJECTED: &str = "announce_join_rejected";
    pub const ANNOUNCE_JOIN_COMMITTED: &str = "announce_join_committed";
    pub const ANNOUNCE_LEAVE: &str = "announce_leave";
    pub const ANNOUNCE_GROUP_DEPARTURE: &str = "announce_group_departure";

    pub const PROBE_CONNECTOR_BUILD_FAILED: &str = "probe_connector_build_failed";
    pub const PROBE_CAPABILITY_MISSING: &str = "probe_capability_missing";
    pub const CONNECTOR_DISCONNECT_FAILED: &str = "connector_disconnect_failed";
    pub const CONNECTOR_BUILD_PANICKED: &str = "connector_build_panicked";

    pub const REGISTRY_CAPACITY_EXCEEDED: &str = "registry_capacity_exceeded";
    pub const REGISTRY_MEMBERSHIP_RETRACTED: &str = "registry_membership_retracted";

    pub const SUBSCRIBER_ADDED: &str = "subscriber_added";
    pub const SUBSCRIBER_REMOVED: &str = "subscriber_removed";
    pub const SUBSCRIBER_RETIRED_FROM_CALLBACK: &str = "subscriber_retired_from_callback";
    pub const UNKNOWN_SUBSCRIBER: &str = "unknown_subscriber";
    pub const REPLAY_PARTIAL_FAILURE: &str = "replay_partial_failure";
    pub const REPLAY_REGISTRATION_DEPARTED: &str = "replay_registration_departed";

    pub const FAN_OUT_CONNECTOR_BUILD_FAILED: &str = "fan_out_connector_build_failed";
    pub const FAN_OUT_CALLBACK_FAILED: &str = "fan_out_callback_failed";
    pub const FAN_OUT_CALLBACK_PANICKED: &str = "fan_out_callback_panicked";
    pub const FAN_OUT_SUBSCRIBER_RETIRED: &str = "fan_out_subscriber_retired";
    pub const FAN_OUT_ALREADY_HANDED_OVER: &str = "fan_out_already_handed_over";

    pub const LOCAL_CONNECTOR_SET: &str = "local_connector_set";
    pub const DISCONNECT_ALL: &str = "disconnect_all";
}

pub mod fields {
    use crate::ConnectionDescriptor;
    use std::collections::BTreeSet;

    /// Renders a descriptor without its configuration properties.
    pub fn format_connection(connection: &ConnectionDescriptor) -> String {
        format!(
            "{}@{}",
            connection.connector_provider, connection.endpoint_address
        )
    }

    pub fn format_memberships(memberships: &BTreeSet<String>) -> String {
        let names: Vec<&str> = memberships.iter().map(String::as_str).collect();
        format!("[{}]", names.join(", "))
    }

}
