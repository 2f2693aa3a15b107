// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
pub mod store;
pub mod telemetry;

// Domain
pub mod broadcast;
pub mod connection_manager;
pub mod game;

// Application
pub mod api;
pub mod server;
pub mod tasks;
pub mod websocket;
