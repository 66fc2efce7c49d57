//! Document store gateway.
//!
//! Generic CRUD, counter, and live-subscription operations over the remote
//! document database. The gateway stamps `createdAt`/`updatedAt` on writes,
//! exposes store-assigned ids as hex strings, and never lets a raw driver
//! error cross its boundary.

use std::sync::Arc;

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{options::IndexOptions, Client, Database, IndexModel};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::filter::ListFilter;
use crate::store::schemas::{
    AdvocacyDoc, CommentDoc, IntoIndexes, LikeDoc, PostDoc, UserProfileDoc, ADVOCACY_COLLECTION,
    COMMENT_COLLECTION, LIKE_COLLECTION, POST_COLLECTION, USER_COLLECTION,
};
use crate::store::subscription::Subscription;
use crate::types::{Result, WayrestError};

/// Callback receiving the full current result set on every remote change.
pub type SnapshotCallback<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

/// Gateway over one remote document database.
#[derive(Clone)]
pub struct DocumentGateway {
    db: Database,
}

impl DocumentGateway {
    /// Connect to the document store and verify the connection.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to document store at {}", uri);

        // Bound server selection so an unreachable store fails fast
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| WayrestError::Database(format!("Failed to connect: {e}")))?;

        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| WayrestError::Database(format!("Store ping failed: {e}")))?;

        info!("Connected to document database '{}'", db_name);
        Ok(Self { db })
    }

    /// Wrap an already-resolved database handle (used by tests and embedders
    /// that manage their own client).
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a document; the store assigns the id, the gateway stamps the
    /// timestamps. Returns the generated id.
    pub async fn create(&self, collection: &str, mut fields: Document) -> Result<String> {
        let now = DateTime::now();
        fields.insert("createdAt", now);
        fields.insert("updatedAt", now);

        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(fields)
            .await
            .map_err(|e| WayrestError::Database(format!("Insert failed: {e}")))?;

        result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or_else(|| WayrestError::Database("Store did not return an id".into()))
    }

    /// Fetch one document by id. A malformed or unknown id is `Ok(None)`:
    /// not-found is a data answer, not an error.
    pub async fn get<T>(&self, collection: &str, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        self.db
            .collection::<T>(collection)
            .find_one(doc! { "_id": oid })
            .await
            .map_err(|e| WayrestError::Database(format!("Find failed: {e}")))
    }

    /// Fetch one document by arbitrary filter.
    pub async fn find_one<T>(&self, collection: &str, filter: Document) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        self.db
            .collection::<T>(collection)
            .find_one(filter)
            .await
            .map_err(|e| WayrestError::Database(format!("Find failed: {e}")))
    }

    /// List documents matching a filter, most recent first by default.
    pub async fn list<T>(&self, collection: &str, filter: &ListFilter) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        run_query(&self.db, collection, filter).await
    }

    /// Merge fields into a document. `updatedAt` is always refreshed with a
    /// store-side timestamp; array fields other than tag-style sets must be
    /// read-modify-written by the caller.
    pub async fn update(&self, collection: &str, id: &str, mut fields: Document) -> Result<()> {
        let oid = parse_id(collection, id)?;
        fields.remove("createdAt");
        fields.remove("updatedAt");

        let update = doc! {
            "$set": fields,
            "$currentDate": { "updatedAt": true },
        };

        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": oid }, update)
            .await
            .map_err(|e| WayrestError::Database(format!("Update failed: {e}")))?;

        if result.matched_count == 0 {
            return Err(WayrestError::NotFound(format!("{collection}/{id}")));
        }
        Ok(())
    }

    /// Merge fields into the document matching `filter`, inserting it when
    /// absent.
    pub async fn upsert(&self, collection: &str, filter: Document, mut fields: Document) -> Result<()> {
        fields.remove("createdAt");
        fields.remove("updatedAt");

        let update = doc! {
            "$set": fields,
            "$setOnInsert": { "createdAt": DateTime::now() },
            "$currentDate": { "updatedAt": true },
        };

        self.db
            .collection::<Document>(collection)
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| WayrestError::Database(format!("Upsert failed: {e}")))?;

        Ok(())
    }

    /// Delete a document by id. Deleting an absent document is not an error.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let oid = parse_id(collection, id)?;

        let result = self
            .db
            .collection::<Document>(collection)
            .delete_one(doc! { "_id": oid })
            .await
            .map_err(|e| WayrestError::Database(format!("Delete failed: {e}")))?;

        if result.deleted_count == 0 {
            debug!(collection = %collection, id = %id, "Delete matched no document");
        }
        Ok(())
    }

    /// Delete all documents matching a filter. Returns how many were removed.
    pub async fn delete_matching(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .db
            .collection::<Document>(collection)
            .delete_many(filter)
            .await
            .map_err(|e| WayrestError::Database(format!("Delete failed: {e}")))?;

        Ok(result.deleted_count)
    }

    /// Atomic server-side counter adjustment. Only for derived counters
    /// (likeCount, commentCount); never for primary data.
    pub async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> Result<()> {
        let oid = parse_id(collection, id)?;

        let mut inc = Document::new();
        inc.insert(field, delta);

        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": oid }, doc! { "$inc": inc })
            .await
            .map_err(|e| WayrestError::Database(format!("Increment failed: {e}")))?;

        if result.matched_count == 0 {
            return Err(WayrestError::NotFound(format!("{collection}/{id}")));
        }
        Ok(())
    }

    /// Watch a collection and deliver the full current result set for
    /// `filter` on every remote change (snapshots, not deltas).
    ///
    /// The initial snapshot is delivered as soon as the watch task starts.
    /// One callback is in flight at a time and snapshots arrive in
    /// remote-commit order; query failures degrade to an empty delivery with
    /// a logged error. The caller must tear the subscription down when the
    /// consuming context goes away.
    pub fn subscribe<T>(
        &self,
        collection: &str,
        filter: ListFilter,
        on_snapshot: SnapshotCallback<T>,
    ) -> Subscription
    where
        T: DeserializeOwned + Send + Sync + Unpin + 'static,
    {
        let db = self.db.clone();
        let collection = collection.to_string();

        let handle: JoinHandle<()> = tokio::spawn(async move {
            deliver_snapshot(&db, &collection, &filter, on_snapshot.as_ref()).await;

            let mut stream = match db.collection::<Document>(&collection).watch().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(collection = %collection, error = %e, "Failed to open change stream");
                    return;
                }
            };

            while let Some(event) = stream.next().await {
                match event {
                    Ok(_) => {
                        deliver_snapshot(&db, &collection, &filter, on_snapshot.as_ref()).await
                    }
                    Err(e) => {
                        error!(collection = %collection, error = %e, "Change stream error; subscription closed");
                        break;
                    }
                }
            }
        });

        Subscription::new(handle)
    }

    /// Apply the schema-defined indexes for every known collection.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.apply_indexes(POST_COLLECTION, PostDoc::into_indices()).await?;
        self.apply_indexes(LIKE_COLLECTION, LikeDoc::into_indices()).await?;
        self.apply_indexes(COMMENT_COLLECTION, CommentDoc::into_indices()).await?;
        self.apply_indexes(ADVOCACY_COLLECTION, AdvocacyDoc::into_indices()).await?;
        self.apply_indexes(USER_COLLECTION, UserProfileDoc::into_indices()).await?;
        Ok(())
    }

    async fn apply_indexes(
        &self,
        collection: &str,
        indices: Vec<(Document, Option<IndexOptions>)>,
    ) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.db
            .collection::<Document>(collection)
            .create_indexes(models)
            .await
            .map_err(|e| WayrestError::Database(format!("Failed to create indexes: {e}")))?;

        Ok(())
    }
}

fn parse_id(collection: &str, id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| WayrestError::NotFound(format!("{collection}/{id}")))
}

async fn run_query<T>(db: &Database, collection: &str, filter: &ListFilter) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    let coll = db.collection::<T>(collection);
    let mut find = coll
        .find(filter.to_document())
        .sort(filter.sort_document());
    if let Some(limit) = filter.limit_value() {
        find = find.limit(limit);
    }

    let cursor = find
        .await
        .map_err(|e| WayrestError::Database(format!("Find failed: {e}")))?;

    let results: Vec<T> = cursor
        .filter_map(|doc| async {
            match doc {
                Ok(d) => Some(d),
                Err(e) => {
                    error!("Error reading document: {}", e);
                    None
                }
            }
        })
        .collect()
        .await;

    Ok(results)
}

async fn deliver_snapshot<T>(
    db: &Database,
    collection: &str,
    filter: &ListFilter,
    on_snapshot: &(dyn Fn(Vec<T>) + Send + Sync),
) where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    match run_query::<T>(db, collection, filter).await {
        Ok(docs) => on_snapshot(docs),
        Err(e) => {
            error!(collection = %collection, error = %e, "Subscription query failed; delivering empty snapshot");
            on_snapshot(Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The mongodb client resolves lazily, so id-handling paths that never
    // reach the wire can run without a store.
    async fn offline_gateway() -> DocumentGateway {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .expect("parse uri");
        DocumentGateway::new(client.database("wayrest-test"))
    }

    #[tokio::test]
    async fn test_get_with_malformed_id_is_none() {
        let gateway = offline_gateway().await;
        let result = gateway.get::<Document>("posts", "not-an-object-id").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_update_with_malformed_id_is_not_found() {
        let gateway = offline_gateway().await;
        let result = gateway.update("posts", "bogus", doc! { "content": "x" }).await;
        assert!(matches!(result, Err(WayrestError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_increment_with_malformed_id_is_not_found() {
        let gateway = offline_gateway().await;
        let result = gateway.increment("posts", "bogus", "likes", 1).await;
        assert!(matches!(result, Err(WayrestError::NotFound(_))));
    }
}
