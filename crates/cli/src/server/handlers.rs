use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue};
use recode_core::naming::ArtifactName;
use recode_core::pipeline::{self, PipelineError};
use recode_core::prompts::TranslateRequest;
use recode_core::workspace::JobWorkspace;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use super::{ApiError, AppState};

pub const UPLOAD_FIELD: &str = "file";
pub const PARSE_FILE_ERROR: &str = "Failed to parse file from request";
pub const CONTENT_TYPE_ERROR: &str = "Invalid Content-Type, expected text/plain";
pub const INVALID_JSON_ERROR: &str = "Invalid JSON format in body";

/// `POST /decompile`: store the uploaded `file`, decompile it, and return the
/// generated annotation.
pub async fn decompile(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("multipart rejected: {e}");
        ApiError::bad_request(PARSE_FILE_ERROR)
    })?;

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => break field,
            Ok(Some(_)) => continue,
            Ok(None) => return Err(ApiError::bad_request(PARSE_FILE_ERROR)),
            Err(e) => {
                tracing::debug!("malformed multipart body: {e}");
                return Err(ApiError::bad_request(PARSE_FILE_ERROR));
            }
        }
    };

    let artifact = ArtifactName::from_upload(field.file_name());
    let job = state.layout.job(&artifact);
    let span = tracing::info_span!("decompile", job = %job.id, artifact = %artifact);

    let result = async {
        let bytes = store_upload(field, &job).await?;
        tracing::info!(job = %job.id, path = %job.binary_path.display(), bytes, "upload stored");
        Ok::<_, ApiError>(
            pipeline::decompile_and_annotate(state.decompiler.clone(), state.generator.as_ref(), &job)
                .await?,
        )
    }
    .instrument(span)
    .await;

    pipeline::cleanup(&job);
    result
}

/// Stream the upload into the job's binary path.
async fn store_upload(mut field: Field<'_>, job: &JobWorkspace) -> Result<u64, ApiError> {
    let io_error = |source: std::io::Error| {
        ApiError::Pipeline(PipelineError::Io { path: job.binary_path.clone(), source })
    };
    job.prepare().map_err(io_error)?;
    let mut file = tokio::fs::File::create(&job.binary_path).await.map_err(io_error)?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

/// `POST /translate`: a JSON envelope declared as `text/plain`.
pub async fn translate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, ApiError> {
    if !is_text_plain(headers.get(CONTENT_TYPE)) {
        return Err(ApiError::bad_request(CONTENT_TYPE_ERROR));
    }

    let request: TranslateRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request(INVALID_JSON_ERROR))?;
    let prompt = request.into_prompt().map_err(|e| ApiError::bad_request(e.to_string()))?;

    tracing::info!(generator = state.generator.name(), "requesting translation");
    Ok(state.generator.generate(&prompt).await?)
}

/// Media type is `text/plain`, ignoring parameters such as `charset`.
fn is_text_plain(value: Option<&HeaderValue>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    value
        .split(';')
        .next()
        .map(|item| item.trim().eq_ignore_ascii_case("text/plain"))
        .unwrap_or(false)
}
