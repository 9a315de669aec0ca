use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    /// UUIDv7 primary key, generated once per upload and never reused.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user. Only the owner may read or delete this record.
    pub user_id: i32,

    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    /// User-supplied display name (≤40 characters).
    pub name: String,

    /// File extension as declared by the uploading client.
    pub extension: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

/// The name a record's bytes live under in the blob store.
///
/// Computed on demand from `(id, extension)`, never stored.
pub fn blob_key(id: Uuid, extension: &str) -> String {
    format!("{id}.{extension}")
}

/// The URL path an external caller uses to request the bytes.
///
/// Computed on demand from `id`, never stored.
pub fn access_path(id: Uuid) -> String {
    format!("/api/v1/images/{id}")
}

impl Model {
    pub fn blob_key(&self) -> String {
        blob_key(self.id, &self.extension)
    }

    pub fn access_path(&self) -> String {
        access_path(self.id)
    }
}
