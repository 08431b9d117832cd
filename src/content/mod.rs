//! Content-store collaborator.
//!
//! Fetches records from the headless CMS and decodes them into explicit
//! optional-field shapes before anything else touches them.

pub mod client;
pub mod records;

pub use client::{ContentStoreClient, ContentStoreConfig};
pub use records::{parse_project_document, CompensatorRecord, ProjectRecord};
