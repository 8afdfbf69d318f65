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

//! Data-plane layer.
//!
//! Owns subscriber registration and callback delivery. Every fan-out works on a snapshot
//! of the subscriber list; each subscriber is guarded by a retirement gate so that a
//! callback never reaches a consumer after its unsubscribe has returned. Callback errors
//! and panics stay with the subscriber that raised them.

pub(crate) mod fan_out;
pub(crate) mod subscriber_registry;
