//! Adapters between raw callback requests and the application layer.

pub mod callback;
