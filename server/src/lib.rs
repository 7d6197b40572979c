//! Pulse Server - Real-time event fan-out hub.
//!
//! This crate provides the real-time layer of the social-networking backend,
//! responsible for:
//! - Accepting WebSocket connections from authenticated browsers
//! - Grouping connections into broadcast groups
//! - Routing published domain events to the right audience
//!
//! # Architecture
//!
//! The server sits between the CRUD backend (event producers) and browsers
//! (event consumers). Producers publish typed events with an audience rule;
//! the router fans each event out to the matching connections in real time
//! without persistent storage.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod gatekeeper;
pub mod publish;
pub mod registry;
pub mod routes;
pub mod types;
