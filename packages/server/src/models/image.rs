use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::image;
use crate::error::AppError;

pub const MAX_NAME_CHARS: usize = 40;

/// Checks a display name as submitted in the upload form.
pub fn validate_display_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Name must be 1-{MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Response DTO for a single image record.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageResponse {
    /// Image ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    /// User-supplied display name.
    #[schema(example = "Sunset over the bay")]
    pub name: String,
    /// File extension from the original upload.
    #[schema(example = "png")]
    pub extension: String,
    /// URL path the image bytes are served from.
    #[schema(example = "/api/v1/images/01936f0e-1234-7abc-8000-000000000001")]
    pub access_path: String,
    pub created_at: DateTime<Utc>,
}

/// Response DTO for listing the caller's images.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageListResponse {
    pub images: Vec<ImageResponse>,
    pub total: u64,
}

impl From<image::Model> for ImageResponse {
    fn from(model: image::Model) -> Self {
        let access_path = model.access_path();
        Self {
            id: model.id.to_string(),
            name: model.name,
            extension: model.extension,
            access_path,
            created_at: model.created_at,
        }
    }
}
