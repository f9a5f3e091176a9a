//! Request/response models, grouped by backend area.

pub mod audit;
pub mod datasources;
pub mod pagination;
pub mod users;
