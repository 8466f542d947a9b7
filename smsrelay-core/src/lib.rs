//! # smsrelay Core Library
//!
//! Relays notification requests to an SMS provider, either one envelope at a
//! time or by draining a subscription under a quota and a listening window.

pub mod drain;
pub mod envelope;
pub mod models;
pub mod server;
pub mod services;
pub mod subscription;
