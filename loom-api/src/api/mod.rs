//! HTTP API handlers

pub mod analytics;
pub mod auth;
pub mod auth_middleware;
pub mod dreams;
pub mod health;
pub mod images;
pub mod symbols;
pub mod users;
pub mod ws;
