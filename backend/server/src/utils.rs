use axum::{
    body::Bytes,
    extract::{
        Multipart,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};

use crate::{error::AppError, models::PDF_CONTENT_TYPE};

#[derive(Debug, Default)]
pub struct UploadForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn is_pdf(&self) -> bool {
        is_pdf(self.content_type.as_deref(), self.file_name.as_deref())
    }
}

/// Reads the `file`, `title` and `author` parts, failing as soon as the file outgrows `limit`.
pub async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = read_limited(field, limit).await?;

                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "title" => form.title = Some(field.text().await.map_err(|e| multipart_error(e, limit))?),
            "author" => form.author = Some(field.text().await.map_err(|e| multipart_error(e, limit))?),
            _ => {
                #[cfg(feature = "verbose")]
                tracing::info!("Ignoring multipart field {name}");
            }
        }
    }

    Ok(form)
}

async fn read_limited(mut field: Field<'_>, limit: usize) -> Result<Bytes, AppError> {
    let mut buffer = Vec::new();

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        if buffer.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }

        buffer.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffer))
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::BadRequest(err.body_text())
    }
}

pub fn is_pdf(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        || file_name.is_some_and(|name| name.to_lowercase().ends_with(".pdf"))
}

/// Trimmed value, `None` when absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Some("application/pdf"), None));
        assert!(is_pdf(Some("Application/PDF"), Some("notes")));
        assert!(is_pdf(Some("application/octet-stream"), Some("Notes.PDF")));
        assert!(!is_pdf(Some("image/png"), Some("notes.png")));
        assert!(!is_pdf(None, None));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Jane  ")), Some("Jane".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
