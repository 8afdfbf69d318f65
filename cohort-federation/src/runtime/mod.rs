//! Runtime integration layer.
//!
//! Isolates every call into the external connector factory and into connectors themselves,
//! so that panics and failures from remote handshakes are turned into typed errors here
//! and never reach registry state.

pub(crate) mod connector_lifecycle;
