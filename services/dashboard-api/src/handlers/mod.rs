//! HTTP request handlers for the dashboard API.

pub mod health;
pub mod layers;
pub mod pass;
