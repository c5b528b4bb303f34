//! Application Layer - Use cases and port definitions.
//!
//! The contracts between the relay core and its external collaborators.

/// Port interfaces for external systems (the upstream authenticator).
pub mod ports;
