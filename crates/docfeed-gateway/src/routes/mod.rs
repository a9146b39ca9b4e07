//! HTTP route handlers.

pub mod changes;
pub mod documents;
pub mod health;
