use crate::error::AppError;

const MAX_EXTENSION_LEN: usize = 16;

/// Pulls the extension out of a client-supplied filename.
///
/// The extension is taken on trust from the upload (it names the blob on
/// disk and nothing else); only its shape is checked. It is lowercased,
/// must be ASCII alphanumeric and at most 16 characters.
pub fn extract_extension(filename: &str) -> Result<String, AppError> {
    let (stem, ext) = filename
        .rsplit_once('.')
        .ok_or_else(|| AppError::Validation("Filename has no extension".into()))?;

    if stem.is_empty() {
        return Err(AppError::Validation("Filename has no extension".into()));
    }

    let ext = ext.to_ascii_lowercase();
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::Validation(format!(
            "Invalid file extension: {ext:?}"
        )));
    }

    Ok(ext)
}
