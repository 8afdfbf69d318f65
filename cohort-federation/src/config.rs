/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

//! Federation-wide settings fixed at coordinator construction.

use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::fs::{self, canonicalize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_MAX_REMOTE_REGISTRATIONS: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Label used in log events.
    pub name: String,
    /// Whether remote connectors are distributed to subscribers at all.
    pub enterprise_access_enabled: bool,
    pub max_remote_registrations: usize,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            name: "federation".to_string(),
            enterprise_access_enabled: true,
            max_remote_registrations: DEFAULT_MAX_REMOTE_REGISTRATIONS,
        }
    }
}

impl FederationConfig {
    pub fn new(name: &str, enterprise_access_enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enterprise_access_enabled,
            ..Default::default()
        }
    }

    /// Zero is rejected by [`validate`](Self::validate), which the coordinator runs on
    /// construction.
    pub fn with_max_remote_registrations(mut self, max_remote_registrations: usize) -> Self {
        self.max_remote_registrations = max_remote_registrations;
        self
    }

    pub fn from_json_str(data: &str) -> Result<Self, FederationError> {
        let config: FederationConfig = serde_json::from_str(data).map_err(|error| {
            FederationError::configuration(format!("Unable to parse JSON: {error:?}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FederationError> {
        let config_file = canonicalize(path.as_ref()).map_err(|error| {
            FederationError::configuration(format!(
                "Federation config file not found: {error:?}"
            ))
        })?;
        debug!("federation config file: {config_file:?}");

        let data = fs::read_to_string(&config_file).map_err(|error| {
            FederationError::configuration(format!("Unable to read file: {error:?}"))
        })?;

        Self::from_json_str(&data)
    }

    /// Rejects settings no coordinator can run with.
    pub fn validate(&self) -> Result<(), FederationError> {
        if self.max_remote_registrations == 0 {
            return Err(FederationError::configuration(
                "max_remote_registrations must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FederationConfig, DEFAULT_MAX_REMOTE_REGISTRATIONS};
    use crate::FederationError;

    #[test]
    fn missing_fields_take_defaults() {
        let config = FederationConfig::from_json_str(r#"{"name": "cocoMDS1"}"#)
            .expect("valid config json");

        assert_eq!(config.name, "cocoMDS1");
        assert!(config.enterprise_access_enabled);
        assert_eq!(
            config.max_remote_registrations,
            DEFAULT_MAX_REMOTE_REGISTRATIONS
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = FederationConfig::from_json_str(r#"{"max_remote_registrations": 0}"#);

        assert!(matches!(
            result,
            Err(FederationError::Configuration { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let result = FederationConfig::from_json_str("{ not json");

        assert!(matches!(
            result,
            Err(FederationError::Configuration { .. })
        ));
    }

    #[test]
    fn static_config_file_loads() {
        let config = FederationConfig::from_json_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/static-configs/federation.json"
        ))
        .expect("static config loads");

        assert_eq!(config.name, "cocoMDS1");
        assert!(config.enterprise_access_enabled);
        assert_eq!(config.max_remote_registrations, 256);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let result = FederationConfig::from_json_file("static-configs/does-not-exist.json");

        assert!(matches!(
            result,
            Err(FederationError::Configuration { .. })
        ));
    }
}
