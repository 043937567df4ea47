//! interconnect-fixture: test fixtures and footprints for a 100-pin interconnect chip
//!
//! The chip is a square matrix of pins. Outer pins (`C<n>` freely
//! configurable, `X<n>` fixed diagonal pairs) are exposed to the user, who
//! groups them into named connections. This crate resolves the resulting
//! connectivity and emits a new circuit record list: either a bench
//! fixture with labelled test pads, or a bare footprint.
//!
//! # Modules
//!
//! - [`interconnect`]: Chip loading, net grouping, connectivity resolution,
//!   bridge search and generation
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Configuration error types
//! - [`mcp`]: MCP server exposing the pipeline as tools

pub mod config;
pub mod error;
pub mod interconnect;
pub mod mcp;
