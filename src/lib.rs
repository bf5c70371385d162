//! Mayfly Forms - form submission relay
//!
//! This crate holds the admission side of a service that relays form
//! submissions as email. Every submission passes through an in-process
//! sliding-window rate limiter keyed by client address and API key before
//! any validation or delivery happens.

pub mod admission;
pub mod config;
pub mod error;
pub mod ratelimit;
