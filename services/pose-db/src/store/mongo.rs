use super::{DocumentStream, InsertOutcome, PoseCollection, PoseStore, WriteFailure};
use crate::config::MongoConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use bson::{doc, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::{debug, info, instrument};

/// MongoDB-backed pose store
pub struct MongoPoseStore {
    client: Client,
    poses_2d: Collection<Document>,
    poses_3d: Collection<Document>,
}

impl MongoPoseStore {
    /// Connect and resolve both pose collections.
    ///
    /// The server is pinged so an unreachable store fails here rather than on
    /// first use.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.connect_timeout = Some(config.connect_timeout());
        options.server_selection_timeout = Some(config.server_selection_timeout());
        if let Some(app_name) = &config.app_name {
            options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        database.run_command(doc! { "ping": 1 }).await?;

        info!(
            database = %config.database,
            poses_2d = %config.poses_2d_collection,
            poses_3d = %config.poses_3d_collection,
            "Connected to pose store"
        );

        Ok(Self {
            poses_2d: database.collection(&config.poses_2d_collection),
            poses_3d: database.collection(&config.poses_3d_collection),
            client,
        })
    }

    fn collection(&self, collection: PoseCollection) -> &Collection<Document> {
        match collection {
            PoseCollection::Poses2d => &self.poses_2d,
            PoseCollection::Poses3d => &self.poses_3d,
        }
    }
}

#[async_trait]
impl PoseStore for MongoPoseStore {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn insert_unordered(
        &self,
        collection: PoseCollection,
        documents: Vec<Document>,
    ) -> Result<InsertOutcome, StoreError> {
        let attempted = documents.len();

        match self
            .collection(collection)
            .insert_many(documents)
            .ordered(false)
            .await
        {
            Ok(result) => Ok(InsertOutcome {
                attempted,
                inserted: result.inserted_ids.len(),
                failures: Vec::new(),
            }),
            Err(e) => {
                let write_errors = match e.kind.as_ref() {
                    ErrorKind::InsertMany(failure) => failure.write_errors.clone(),
                    _ => None,
                };

                match write_errors {
                    Some(write_errors) if !write_errors.is_empty() => {
                        let failures: Vec<WriteFailure> = write_errors
                            .into_iter()
                            .map(|w| WriteFailure {
                                index: w.index,
                                code: w.code,
                                message: w.message,
                            })
                            .collect();

                        debug!(failed = failures.len(), "Bulk insert partially rejected");

                        Ok(InsertOutcome {
                            attempted,
                            inserted: attempted.saturating_sub(failures.len()),
                            failures,
                        })
                    }
                    _ => Err(e.into()),
                }
            }
        }
    }

    #[instrument(skip(self, filter))]
    async fn find(
        &self,
        collection: PoseCollection,
        filter: Document,
    ) -> Result<DocumentStream, StoreError> {
        let cursor = self.collection(collection).find(filter).await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        debug!("Pose store connection closed");
    }
}
