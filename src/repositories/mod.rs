//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! database entities.

pub mod document;

pub use document::{DocumentRepository, NewDocument, StatusStore, StatusUpdate, StoreError};
