//! Concrete implementations of the bridge traits.
//!
//! This module contains implementations of the traits defined in
//! [`crate::traits`] for testing and desktop development.
//!
//! # Available Implementations
//!
//! - `mock`: Recording transport, controllable clock and in-memory
//!   site/loadpoint/vehicle objects
//!
//! The broker-backed transport lives in `services::mqtt` (requires `mqtt`
//! feature).

pub mod mock;

pub use mock::*;
