use crate::config::{Config, MongoConfig};
use crate::error::{PoseDbError, Result};
use crate::models::{Pose2d, Validate};
use crate::query::PoseQuery;
use crate::store::{DocumentStream, InsertOutcome, MongoPoseStore, PoseCollection, PoseStore};
use crate::transform::{transform_pose_2d, Poses2dTable};
use futures::TryStreamExt;
use tracing::{debug, error, info, instrument};

/// Access handle over the 2D and 3D pose collections.
///
/// Owns the store connection exclusively. Release it with [`cleanup`]; a
/// handle dropped without cleanup still releases the connection, but without
/// waiting for the store to close it.
///
/// [`cleanup`]: PoseHandle::cleanup
pub struct PoseHandle<S: PoseStore = MongoPoseStore> {
    store: Option<S>,
}

impl PoseHandle<MongoPoseStore> {
    /// Connect to the pose store.
    ///
    /// Without an explicit URI the configured one is used (`MONGO_POSE_URI`
    /// or `POSE_DB__MONGO__URI`).
    pub async fn connect(db_uri: Option<&str>) -> Result<Self> {
        let config = match db_uri {
            Some(uri) => MongoConfig::from_uri(uri),
            None => {
                Config::load()
                    .map_err(|e| PoseDbError::Config(e.to_string()))?
                    .mongo
            }
        };
        Self::connect_with_config(&config).await
    }

    pub async fn connect_with_config(config: &MongoConfig) -> Result<Self> {
        let store = MongoPoseStore::connect(config).await?;
        Ok(Self::with_store(store))
    }
}

impl<S: PoseStore> PoseHandle<S> {
    pub fn with_store(store: S) -> Self {
        Self { store: Some(store) }
    }

    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or(PoseDbError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// Validate and insert a batch of 2D poses, unordered.
    ///
    /// Any invalid record rejects the whole batch before submission. Records
    /// the store refuses (e.g. duplicate ids) are logged and reported in the
    /// outcome; they do not fail the call.
    #[instrument(skip(self, batch), fields(count = batch.len()))]
    pub async fn insert_poses_2d(&self, batch: &[Pose2d]) -> Result<InsertOutcome> {
        let store = self.store()?;
        if batch.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let documents = batch
            .iter()
            .map(|pose| {
                pose.validate()?;
                bson::to_document(pose).map_err(|e| PoseDbError::Store(e.into()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Inserting {} into poses_2d...", documents.len());

        let outcome = store
            .insert_unordered(PoseCollection::Poses2d, documents)
            .await?;

        metrics::counter!("pose_db.poses_2d.inserted").increment(outcome.inserted as u64);

        if outcome.is_complete() {
            debug!("Successfully wrote {} records into poses_2d", outcome.inserted);
        } else {
            metrics::counter!("pose_db.poses_2d.insert_failures")
                .increment(outcome.failures.len() as u64);
            error!(
                attempted = outcome.attempted,
                inserted = outcome.inserted,
                failed = outcome.failures.len(),
                failures = ?outcome.failures,
                "Failed writing some records to poses_2d"
            );
        }

        Ok(outcome)
    }

    /// Lazy cursor over the raw stored documents matching `query`
    #[instrument(skip(self))]
    pub async fn generate_poses_2d_find_iterator(&self, query: &PoseQuery) -> Result<DocumentStream> {
        let store = self.store()?;
        let filter = query.build_filter()?;
        Ok(store.find(PoseCollection::Poses2d, filter).await?)
    }

    /// Fetch matching 2D poses as a table indexed by `pose_2d_id`, ascending by timestamp.
    ///
    /// No matches yield an empty table. A malformed stored record fails the call.
    #[instrument(skip(self))]
    pub async fn fetch_poses_2d(&self, query: &PoseQuery) -> Result<Poses2dTable> {
        let store_time_zone = query.time_zone();
        let mut cursor = self.generate_poses_2d_find_iterator(query).await?;

        let mut rows = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            rows.push(transform_pose_2d(&document, store_time_zone)?);
        }

        metrics::counter!("pose_db.poses_2d.fetched").increment(rows.len() as u64);
        debug!(rows = rows.len(), "Fetched poses_2d");

        Ok(Poses2dTable::from_rows(rows))
    }

    /// Release the store connection. Later calls are no-ops.
    pub async fn cleanup(&mut self) {
        if let Some(store) = self.store.take() {
            store.shutdown().await;
            info!("Pose handle closed");
        }
    }
}

impl<S: PoseStore> Drop for PoseHandle<S> {
    fn drop(&mut self) {
        if self.store.take().is_some() {
            debug!("Pose handle dropped without cleanup, releasing connection");
        }
    }
}
