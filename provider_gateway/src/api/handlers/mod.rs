//! HTTP request handlers.

pub mod compute;
pub mod services;
