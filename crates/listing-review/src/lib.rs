//! Review workflow for agent-submitted property listings.
//!
//! Agents draft listings and submit them for approval; administrators review them and read
//! the access log. Domain logic lives in [`listings`]. The remaining modules carry process
//! configuration, tracing setup and the top-level error type.

pub mod config;
pub mod error;
pub mod listings;
pub mod telemetry;
