//! HTTP surface for the weft pipeline.
//!
//! Routes are exposed as composable [`axum::Router`] builders so
//! applications can assemble exactly the surface they need.

pub mod http;
pub mod service;
