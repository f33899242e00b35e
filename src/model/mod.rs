//! Persistent and wire types.
//!
//! Election records are owned by the surrounding election-management system;
//! this service reads them and appends invitation events alongside them.

pub mod auth;
pub mod election;
pub mod event;
pub mod mongodb;
pub mod revision;
