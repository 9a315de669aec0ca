//! Transactional record+blob operations.
//!
//! Every mutation pairs a database row with a file in the blob store. The
//! row is the source of truth; the blob write or delete happens inside the
//! row's transaction so a failure on either side leaves no half-state. A
//! record without its blob is an inconsistency and is reported, never
//! repaired in place.

use std::path::Path;

use chrono::Utc;
use common::storage::{BlobKey, BlobStore, BoxReader};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use tracing::instrument;
use uuid::Uuid;

use crate::entity::image;
use crate::error::AppError;

/// Creates an image record and writes its bytes, atomically.
///
/// The payload must already be on local disk (uploads are spooled to a temp
/// file first). If the blob write fails the transaction is rolled back and
/// no record survives. If the commit itself fails the just-written blob is
/// removed on a best-effort basis.
#[instrument(skip(db, blobs, payload_path))]
pub async fn store_image(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    owner_id: i32,
    name: String,
    extension: String,
    payload_path: &Path,
) -> Result<image::Model, AppError> {
    let id = Uuid::now_v7();
    let key = BlobKey::new(image::blob_key(id, &extension))
        .map_err(|e| AppError::Internal(format!("Derived blob key rejected: {e}")))?;

    let txn = db.begin().await?;

    let record = image::ActiveModel {
        id: Set(id),
        user_id: Set(owner_id),
        name: Set(name),
        extension: Set(extension),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    let file = tokio::fs::File::open(payload_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reopen upload: {e}")))?;
    let reader: BoxReader = Box::new(file);

    if let Err(e) = blobs.write(&key, reader).await {
        txn.rollback().await?;
        return Err(AppError::TransactionAborted(format!(
            "Blob write failed for {key}: {e}"
        )));
    }

    if let Err(e) = txn.commit().await {
        // The blob landed but the record did not. Remove the blob so no
        // unreferenced bytes remain.
        let _ = blobs.delete(&key).await;
        return Err(AppError::TransactionAborted(format!(
            "Commit failed after blob write for {key}: {e}"
        )));
    }

    Ok(record)
}

/// Deletes an image record and its bytes, atomically.
///
/// The record delete and the blob delete succeed or fail together. A blob
/// that is already missing means the store has drifted from the database;
/// the transaction is rolled back and the drift is surfaced.
#[instrument(skip(db, blobs, record), fields(id = %record.id))]
pub async fn remove_image(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    record: &image::Model,
) -> Result<(), AppError> {
    let key = BlobKey::new(record.blob_key())
        .map_err(|e| AppError::Internal(format!("Derived blob key rejected: {e}")))?;

    let txn = db.begin().await?;

    image::Entity::delete_by_id(record.id).exec(&txn).await?;

    match blobs.delete(&key).await {
        Ok(true) => {
            txn.commit().await?;
            Ok(())
        }
        Ok(false) => {
            txn.rollback().await?;
            Err(AppError::StorageInconsistency(format!(
                "No blob found for record {} (expected key {key})",
                record.id
            )))
        }
        Err(e) => {
            txn.rollback().await?;
            Err(AppError::TransactionAborted(format!(
                "Blob delete failed for {key}: {e}"
            )))
        }
    }
}

/// Opens a byte stream for an existing record.
pub async fn open_stream(
    blobs: &dyn BlobStore,
    record: &image::Model,
) -> Result<BoxReader, AppError> {
    let key = BlobKey::new(record.blob_key())
        .map_err(|e| AppError::Internal(format!("Derived blob key rejected: {e}")))?;

    blobs.read_stream(&key).await.map_err(|e| match e {
        common::storage::StorageError::NotFound(_) => AppError::StorageInconsistency(format!(
            "Record {} exists but its blob {key} is missing",
            record.id
        )),
        other => AppError::Internal(other.to_string()),
    })
}
