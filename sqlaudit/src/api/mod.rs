//! Wire contract with the review backend: reply envelope decoding and request/response models.

pub(crate) mod envelope;
pub mod models;
