//! HTTP surface of the AQI estimation engine
//!
//! Serves dual-model predictions, the prediction history, and the usual
//! health, readiness and Prometheus endpoints.

pub mod api;
pub mod config;
