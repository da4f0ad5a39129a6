// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Collaborators
pub mod auth;
pub mod identity;

// Gateway core
pub mod connection_manager;
pub mod gateway;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
