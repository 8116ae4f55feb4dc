//! In-process pose store.
//!
//! Evaluates the same filter operators the handle emits (equality, `$in`,
//! `$gte`, `$lt` on dotted paths) and enforces `_id` uniqueness the way the
//! real store does, reporting duplicates per batch member.

use super::{
    DocumentStream, InsertOutcome, PoseCollection, PoseStore, WriteFailure, DUPLICATE_KEY_CODE,
};
use crate::error::StoreError;
use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Pose store held entirely in memory
#[derive(Default)]
pub struct MemoryPoseStore {
    collections: Mutex<HashMap<PoseCollection, Vec<Document>>>,
}

impl MemoryPoseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents in a collection
    pub fn count(&self, collection: PoseCollection) -> usize {
        self.collections
            .lock()
            .get(&collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl PoseStore for MemoryPoseStore {
    async fn insert_unordered(
        &self,
        collection: PoseCollection,
        documents: Vec<Document>,
    ) -> Result<InsertOutcome, StoreError> {
        let attempted = documents.len();
        let mut collections = self.collections.lock();
        let stored = collections.entry(collection).or_default();

        let mut failures = Vec::new();
        for (index, document) in documents.into_iter().enumerate() {
            let id = document.get("_id");
            let duplicate = id.is_some() && stored.iter().any(|existing| existing.get("_id") == id);
            if duplicate {
                failures.push(WriteFailure {
                    index,
                    code: DUPLICATE_KEY_CODE,
                    message: format!(
                        "E11000 duplicate key error collection: {collection} index: _id_"
                    ),
                });
                continue;
            }
            stored.push(document);
        }

        debug!(
            collection = %collection,
            attempted,
            failed = failures.len(),
            "In-memory insert"
        );

        Ok(InsertOutcome {
            attempted,
            inserted: attempted - failures.len(),
            failures,
        })
    }

    async fn find(
        &self,
        collection: PoseCollection,
        filter: Document,
    ) -> Result<DocumentStream, StoreError> {
        let matching: Vec<Document> = self
            .collections
            .lock()
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches_filter(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(stream::iter(matching.into_iter().map(Ok)).boxed())
    }

    async fn shutdown(&self) {}
}

/// Whether `document` satisfies every condition in `filter`
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(path, condition)| {
        let value = lookup(document, path);
        match condition {
            Bson::Document(operators) if is_operator_document(operators) => operators
                .iter()
                .all(|(operator, operand)| apply_operator(value, operator, operand)),
            expected => value == Some(expected),
        }
    })
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(nested) => nested.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn apply_operator(value: Option<&Bson>, operator: &str, operand: &Bson) -> bool {
    match operator {
        "$eq" => value == Some(operand),
        "$in" => match (value, operand) {
            (Some(value), Bson::Array(candidates)) => candidates.contains(value),
            _ => false,
        },
        "$gte" => compare(value, operand).is_some_and(|o| o != Ordering::Less),
        "$gt" => compare(value, operand) == Some(Ordering::Greater),
        "$lte" => compare(value, operand).is_some_and(|o| o != Ordering::Greater),
        "$lt" => compare(value, operand) == Some(Ordering::Less),
        _ => false,
    }
}

fn compare(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    match (value?, operand) {
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (a, b) => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}
