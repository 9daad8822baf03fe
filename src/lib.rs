//! Classroom Live - Realtime Session Coordination Service
//!
//! This crate implements the realtime layer of the virtual classroom
//! platform: WebRTC signaling relay, synchronized whiteboard, session
//! lifecycle, and control handoff, routed through a third-party pub/sub bus.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
