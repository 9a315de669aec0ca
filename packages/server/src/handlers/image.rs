use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, body::Body};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use ::image::guess_format as sniff_image_format;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::images;
use crate::models::image::{ImageListResponse, ImageResponse, validate_display_name};
use crate::state::AppState;
use crate::utils::filename::extract_extension;

/// Bytes of the payload inspected to confirm it is an image.
const SNIFF_LEN: usize = 512;

pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(64 * 1024 * 1024) // 64 MB
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Images",
    operation_id = "listImages",
    summary = "List the caller's images",
    description = "Returns every image record owned by the authenticated user, oldest first.",
    responses(
        (status = 200, description = "Image list", body = ImageListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_images(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ImageListResponse>, AppError> {
    let records = image::Entity::find()
        .filter(image::Column::UserId.eq(auth_user.user_id))
        .order_by_asc(image::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let total = records.len() as u64;
    let images = records.into_iter().map(ImageResponse::from).collect();

    Ok(Json(ImageListResponse { images, total }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Images",
    operation_id = "uploadImage",
    summary = "Upload an image",
    description = "Accepts a multipart form with a `name` text field (display name, up to 40 \
        characters) and a `file` field holding the image. The payload must start with a \
        recognizable image signature. On success the client is redirected to the image list.",
    request_body(content_type = "multipart/form-data", description = "Display name and image file"),
    responses(
        (status = 303, description = "Image stored; redirect to the image list"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 422, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut display_name: Option<String> = None;
    let mut upload: Option<SpooledUpload> = None;

    let result = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        {
            match field.name() {
                Some("name") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read name: {e}")))?;
                    display_name = Some(text);
                }
                Some("file") => {
                    let filename = field
                        .file_name()
                        .map(|s| s.to_string())
                        .ok_or_else(|| {
                            AppError::Validation("File field must have a filename".into())
                        })?;
                    upload = Some(
                        spool_field_to_disk(
                            field,
                            filename,
                            state.config.storage.max_upload_size,
                        )
                        .await?,
                    );
                }
                _ => {} // Ignore unknown fields.
            }
        }

        let name = display_name
            .ok_or_else(|| AppError::Validation("Missing 'name' field".into()))?;
        let name = validate_display_name(&name)?;

        let upload = upload
            .as_ref()
            .ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

        let extension = extract_extension(&upload.filename)?;

        if sniff_image_format(&upload.prefix).is_err() {
            return Err(AppError::Validation(
                "File does not look like an image".into(),
            ));
        }

        images::store_image(
            &state.db,
            &*state.blobs,
            auth_user.user_id,
            name,
            extension,
            &upload.temp_path,
        )
        .await
    }
    .await;

    if let Some(upload) = upload {
        // Best effort.
        let _ = tokio::fs::remove_file(&upload.temp_path).await;
    }

    result?;
    Ok(Redirect::to("/api/v1/images"))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Images",
    operation_id = "showImage",
    summary = "Stream an image's bytes",
    description = "Streams the stored bytes of an image owned by the caller. Images owned by \
        other users answer 404 so their existence is not revealed.",
    params(("id" = String, Path, description = "Image ID (UUID)")),
    responses(
        (status = 200, description = "Image content"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Blob missing for record (STORAGE_INCONSISTENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, id))]
pub async fn show_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let record = find_owned_image(&state, &auth_user, &id).await?;

    let reader = images::open_stream(&*state.blobs, &record).await?;
    build_image_response(&record, reader).await
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Images",
    operation_id = "deleteImage",
    summary = "Delete an image",
    description = "Removes the record and its stored bytes together. Deleting an image owned by \
        another user answers 403. On success the client is redirected to the image list.",
    params(("id" = String, Path, description = "Image ID (UUID)")),
    responses(
        (status = 303, description = "Image deleted; redirect to the image list"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, id))]
pub async fn delete_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let image_id = parse_image_id(&id)?;

    let record = image::Entity::find_by_id(image_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

    if record.user_id != auth_user.user_id {
        return Err(AppError::PermissionDenied);
    }

    images::remove_image(&state.db, &*state.blobs, &record).await?;

    Ok(Redirect::to("/api/v1/images"))
}

fn parse_image_id(id: &str) -> Result<Uuid, AppError> {
    // A malformed id names nothing, so it reads the same as a miss.
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Image not found".into()))
}

/// Look up an image for a read operation. Records owned by someone else are
/// reported as missing.
async fn find_owned_image(
    state: &AppState,
    auth_user: &AuthUser,
    id: &str,
) -> Result<image::Model, AppError> {
    let image_id = parse_image_id(id)?;

    let record = image::Entity::find_by_id(image_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

    if record.user_id != auth_user.user_id {
        return Err(AppError::NotFound("Image not found".into()));
    }

    Ok(record)
}

struct SpooledUpload {
    temp_path: std::path::PathBuf,
    filename: String,
    /// First bytes of the payload, kept for format sniffing.
    prefix: Vec<u8>,
}

/// Stream a multipart field to a temp file, keeping the first bytes in
/// memory for format sniffing.
async fn spool_field_to_disk(
    mut field: axum::extract::multipart::Field<'_>,
    filename: String,
    max_size: u64,
) -> Result<SpooledUpload, AppError> {
    let temp_path = std::env::temp_dir().join(format!("picstore-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut prefix: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
        let mut total_size: u64 = 0;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
        {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::Validation(format!(
                    "File exceeds maximum size of {max_size} bytes"
                )));
            }
            if prefix.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - prefix.len()).min(chunk.len());
                prefix.extend_from_slice(&chunk[..take]);
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;

        if total_size == 0 {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }

        Ok(SpooledUpload {
            temp_path: temp_path.clone(),
            filename,
            prefix,
        })
    }
    .await;

    if result.is_err() {
        // Best effort.
        let _ = tokio::fs::remove_file(&temp_path).await;
    }

    result
}

/// Build a streaming response for an image record.
async fn build_image_response(
    record: &image::Model,
    mut reader: common::storage::BoxReader,
) -> Result<Response, AppError> {
    // Sniff the content type from the leading bytes, then stitch them back
    // in front of the remaining stream.
    let mut prefix = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    loop {
        let n = reader
            .read(&mut prefix[filled..])
            .await
            .map_err(|e| AppError::Internal(format!("Blob read failed: {e}")))?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == prefix.len() {
            break;
        }
    }
    prefix.truncate(filled);

    let content_type = sniff_image_format(&prefix)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    let body = Body::from_stream(ReaderStream::new(
        std::io::Cursor::new(prefix).chain(reader),
    ));

    let filename = format!("{}.{}", record.name, record.extension);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition_value(&filename))
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("inline; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
