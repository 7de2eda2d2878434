//! HTTP surface of the heart disease classifier.

pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod routes;
