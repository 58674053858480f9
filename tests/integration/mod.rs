//! Integration test suite for waypoint.
//!
//! These tests drive the engine, progress store and host together the way
//! the binary does, without a terminal.
//!
//! # Test Categories
//!
//! - `engine_flow`: navigation, exits, initializers and signal guards
//! - `persistence`: resume points across engine restarts and store backends
//! - `host_routing`: route parsing, page set resolution and the advance hook
//! - `headless_run`: scripted runs and their JSON report


mod engine_flow;
mod headless_run;
mod persistence;
