//! Screenfix Core - Shared types library.
//!
//! This crate provides common types used across Screenfix components:
//! - `server` - The booking-service backend (auth, sessions, pricing)
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and usernames

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
