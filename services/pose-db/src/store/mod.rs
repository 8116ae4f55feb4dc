//! Document store boundary.

pub mod memory;
pub mod mongo;

pub use memory::MemoryPoseStore;
pub use mongo::MongoPoseStore;

use crate::error::StoreError;
use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use serde::Serialize;
use std::fmt;

/// Duplicate-key error code reported by the store
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Lazy stream of raw stored documents
pub type DocumentStream = BoxStream<'static, Result<Document, StoreError>>;

/// Pose collections within the `poses` database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseCollection {
    Poses2d,
    Poses3d,
}

impl PoseCollection {
    pub fn default_name(&self) -> &'static str {
        match self {
            PoseCollection::Poses2d => "poses_2d",
            PoseCollection::Poses3d => "poses_3d",
        }
    }
}

impl fmt::Display for PoseCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// A batch member the store refused
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    /// Position of the document in the submitted batch
    pub index: usize,
    pub code: i32,
    pub message: String,
}

/// Result of an unordered bulk insert
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsertOutcome {
    pub attempted: usize,
    pub inserted: usize,
    pub failures: Vec<WriteFailure>,
}

impl InsertOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Operations the pose handle needs from a document store.
///
/// Rejected batch members are reported through [`InsertOutcome::failures`];
/// an `Err` means the store itself could not be reached or used.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoseStore: Send + Sync {
    /// Insert documents without ordering; one rejected document does not stop the rest
    async fn insert_unordered(
        &self,
        collection: PoseCollection,
        documents: Vec<Document>,
    ) -> Result<InsertOutcome, StoreError>;

    /// Stream the documents matching `filter`
    async fn find(
        &self,
        collection: PoseCollection,
        filter: Document,
    ) -> Result<DocumentStream, StoreError>;

    /// Release the connection
    async fn shutdown(&self);
}
