//! Embedded booking core: an in-process ACID store with serializable
//! transactions, a half-open overlap rule for booking windows, and
//! role-scoped booking operations on top.

pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod overlap;
pub mod policy;
pub mod seed;
pub mod service;
pub mod store;
pub mod txn;
