//! Common type definitions.
//!
//! Backend identifiers are server-assigned integers, wrapped in type aliases so signatures say
//! which entity they refer to.

// Type aliases for IDs
pub type DatasourceId = i64;
pub type UserId = i64;
