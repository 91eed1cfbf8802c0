//! # sync-types
//!
//! Data model for mirror-sync live collection mirroring.
//!
//! This crate provides the foundational types used across all mirror-sync crates:
//! - [`RecordId`], [`Subject`], [`CollectionPath`], [`OrderingKey`], [`Generation`] - Identity and ordering types
//! - [`Record`], [`NewRecord`], [`CollectionSnapshot`] - Collection contents
//! - [`CollectionSpec`], [`CollectionRef`], [`OrderBy`] - What is subscribed and how it is sorted
//! - [`Notification`] - Structured success/failure events
//! - [`ChatMessage`], [`PlanUpload`] - Typed payloads

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collection;
mod error;
mod ids;
mod notify;
mod payload;
mod record;

pub use collection::{CollectionRef, CollectionSpec, OrderBy, SortDirection};
pub use error::{ErrorKind, PayloadError};
pub use ids::{CollectionPath, Generation, OrderingKey, RecordId, Subject};
pub use notify::{Notification, NotificationDetail, Operation, Severity};
pub use payload::{ChatMessage, ChatRole, PlanUpload};
pub use record::{CollectionSnapshot, Fields, NewRecord, Record};
