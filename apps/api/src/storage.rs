//! S3 object helpers: uploaded resumes and presigned answer-audio uploads.

use std::time::Duration;

use aws_sdk_s3::{presigning::PresigningConfig, primitives::ByteStream, Client as S3Client};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

/// Audio formats browsers and mobile recorders produce.
pub const AUDIO_EXTENSIONS: &[&str] = &["webm", "wav", "mp3", "m4a", "ogg"];

pub fn resume_key(user_id: Uuid, at: DateTime<Utc>) -> String {
    format!("resumes/{user_id}/{}.pdf", at.timestamp())
}

pub fn audio_key(user_id: Uuid, session_id: Uuid, extension: &str, at: DateTime<Utc>) -> String {
    format!(
        "uploads/{user_id}/{}_{session_id}.{}",
        at.timestamp(),
        extension.to_ascii_lowercase()
    )
}

pub fn audio_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "webm" => Some("audio/webm"),
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "ogg" => Some("audio/ogg"),
        _ => None,
    }
}

pub async fn put_object(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Uploaded s3://{bucket}/{key}");
    Ok(())
}

/// A URL the client can PUT the object to directly, valid for `ttl`.
pub async fn presigned_put_url(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    content_type: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let presigning = PresigningConfig::expires_in(ttl)
        .map_err(|e| AppError::S3(format!("invalid presign duration: {e}")))?;

    let request = s3
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type(content_type)
        .presigned(presigning)
        .await
        .map_err(|e| AppError::S3(format!("presigning {key} failed: {e}")))?;

    Ok(request.uri().to_string())
}
