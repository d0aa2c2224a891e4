//! Leave, attendance and credential consistency engine for the HRM service.
//!
//! The engine keeps an employee's leave quota, attendance sessions and
//! password-reset tokens correct under concurrent requests. Every mutation
//! runs inside one store transaction that holds an exclusive lock on the
//! affected employee, request or token row (see [`engine::gateway`]).

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod geo;
pub mod model;
pub mod store;

pub use engine::{Hr, HrBuilder};
pub use error::{ErrorKind, HrError, StoreError};
