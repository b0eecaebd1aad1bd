use crate::core::parser::parse_csv;
use crate::domain::model::{Batch, DatasetInfo, DestinationPath, UploadResult};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{ErrorCategory, Result, UploaderError};
use crate::utils::validation::validate_file_extension;
use crate::web::page::{self, Notice, PageView, PreviewView, MISSING_INPUTS_MESSAGE};
use crate::web::pending::PendingBatch;
use crate::web::AppState;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields of the multipart upload form.
#[derive(Debug, Default)]
struct UploadFields {
    file: Option<(String, Bytes)>,
    root_node: String,
    replaces: Option<Uuid>,
}

async fn read_upload_fields(mut multipart: Multipart) -> Result<UploadFields> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        UploaderError::validation(format!("invalid form data: {}", e))
    };

    let mut fields = UploadFields::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(invalid)?;
                // 瀏覽器未選檔案時仍會送出空的 file 欄位
                if !file_name.is_empty() || !data.is_empty() {
                    fields.file = Some((file_name, data));
                }
            }
            "root_node" => fields.root_node = field.text().await.map_err(invalid)?,
            "replaces" => {
                let text = field.text().await.map_err(invalid)?;
                fields.replaces = Uuid::parse_str(text.trim()).ok();
            }
            _ => {}
        }
    }
    Ok(fields)
}

fn parse_uploaded_file(file_name: &str, data: &[u8]) -> Result<Batch> {
    if !file_name.is_empty() {
        validate_file_extension("file", file_name, &["csv"])?;
    }
    parse_csv(data)
}

fn status_for(error: &UploaderError) -> StatusCode {
    match error.category() {
        ErrorCategory::Input | ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Store => StatusCode::BAD_GATEWAY,
        ErrorCategory::Configuration | ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn uploaded_at() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub async fn index<S: DocumentStore + 'static>(State(state): State<AppState<S>>) -> Html<String> {
    Html(page::render(&PageView {
        database_url: &state.database_url,
        notice: Some(Notice::Info(MISSING_INPUTS_MESSAGE.to_string())),
        ..PageView::default()
    }))
}

pub async fn preview<S: DocumentStore + 'static>(
    State(state): State<AppState<S>>,
    multipart: Multipart,
) -> Response {
    let fields = match read_upload_fields(multipart).await {
        Ok(fields) => fields,
        Err(e) => return error_page(&state, "", &e),
    };

    let Some((file_name, data)) = fields.file else {
        return missing_inputs_page(&state, &fields.root_node);
    };
    if fields.root_node.trim().is_empty() {
        return missing_inputs_page(&state, &fields.root_node);
    }

    let batch = match parse_uploaded_file(&file_name, &data) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Rejected upload '{}': {}", file_name, e);
            return error_page(&state, &fields.root_node, &e);
        }
    };
    tracing::info!(
        "Parsed '{}': {} rows, {} columns",
        file_name,
        batch.len(),
        batch.column_count()
    );

    let pending = PendingBatch::new(batch, file_name, data.len());
    let batch_id = state.pending.insert(pending.clone(), fields.replaces).await;

    Html(render_pending(&state, batch_id, &pending, &fields.root_node, None, None)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UploadForm {
    pub batch_id: String,
    #[serde(default)]
    pub root_node: String,
}

pub async fn upload<S: DocumentStore + 'static>(
    State(state): State<AppState<S>>,
    Form(form): Form<UploadForm>,
) -> Response {
    let pending = match Uuid::parse_str(form.batch_id.trim()) {
        Ok(id) => state.pending.get(&id).await.map(|p| (id, p)),
        Err(_) => None,
    };
    let Some((batch_id, pending)) = pending else {
        let err = UploaderError::validation("This preview has expired. Choose the file again.");
        return error_page(&state, &form.root_node, &err);
    };

    let destination = match DestinationPath::parse(&form.root_node) {
        Ok(destination) => destination,
        Err(e) => {
            let html = render_pending(
                &state,
                batch_id,
                &pending,
                &form.root_node,
                Some(Notice::Error(e.user_friendly_message())),
                None,
            );
            return (StatusCode::BAD_REQUEST, Html(html)).into_response();
        }
    };

    let result = state.orchestrator.upload(&pending.batch, &destination).await;
    let (status, notice, at) = match &result {
        UploadResult::Success { .. } => (
            StatusCode::OK,
            Notice::Success(result.display_message()),
            Some(uploaded_at()),
        ),
        UploadResult::Failure { .. } => (
            StatusCode::BAD_GATEWAY,
            Notice::Error(result.display_message()),
            None,
        ),
    };

    let html = render_pending(&state, batch_id, &pending, &form.root_node, Some(notice), at);
    (status, Html(html)).into_response()
}

#[derive(Debug, Serialize)]
pub struct ApiUploadResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl ApiUploadResponse {
    fn rejected(error: &UploaderError) -> (StatusCode, Json<Self>) {
        (
            status_for(error),
            Json(Self {
                status: "error",
                message: error.user_friendly_message(),
                count: None,
                dataset: None,
                uploaded_at: None,
            }),
        )
    }
}

/// Parse-and-upload in one request, for scripts.
pub async fn api_upload<S: DocumentStore + 'static>(
    State(state): State<AppState<S>>,
    multipart: Multipart,
) -> (StatusCode, Json<ApiUploadResponse>) {
    let fields = match read_upload_fields(multipart).await {
        Ok(fields) => fields,
        Err(e) => return ApiUploadResponse::rejected(&e),
    };
    let Some((file_name, data)) = fields.file else {
        return ApiUploadResponse::rejected(&UploaderError::validation(MISSING_INPUTS_MESSAGE));
    };

    // 先驗證路徑，避免無效請求觸及網路
    let destination = match DestinationPath::parse(&fields.root_node) {
        Ok(destination) => destination,
        Err(e) => return ApiUploadResponse::rejected(&e),
    };
    let batch = match parse_uploaded_file(&file_name, &data) {
        Ok(batch) => batch,
        Err(e) => return ApiUploadResponse::rejected(&e),
    };
    let dataset = DatasetInfo::new(&batch, data.len());

    let result = state.orchestrator.upload(&batch, &destination).await;
    let message = result.display_message();
    match result {
        UploadResult::Success { count } => (
            StatusCode::OK,
            Json(ApiUploadResponse {
                status: "success",
                message,
                count: Some(count),
                dataset: Some(dataset),
                uploaded_at: Some(uploaded_at()),
            }),
        ),
        UploadResult::Failure { .. } => (
            StatusCode::BAD_GATEWAY,
            Json(ApiUploadResponse {
                status: "error",
                message,
                count: None,
                dataset: Some(dataset),
                uploaded_at: None,
            }),
        ),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn render_pending<S: DocumentStore>(
    state: &AppState<S>,
    batch_id: Uuid,
    pending: &PendingBatch,
    root_node: &str,
    notice: Option<Notice>,
    uploaded_at: Option<String>,
) -> String {
    page::render(&PageView {
        database_url: &state.database_url,
        root_node,
        preview: Some(PreviewView {
            batch_id,
            file_name: &pending.file_name,
            batch: &pending.batch,
            info: pending.info,
            rows: state.preview_rows,
        }),
        notice,
        uploaded_at,
    })
}

fn missing_inputs_page<S: DocumentStore>(state: &AppState<S>, root_node: &str) -> Response {
    let html = page::render(&PageView {
        database_url: &state.database_url,
        root_node,
        notice: Some(Notice::Info(MISSING_INPUTS_MESSAGE.to_string())),
        ..PageView::default()
    });
    (StatusCode::BAD_REQUEST, Html(html)).into_response()
}

fn error_page<S: DocumentStore>(state: &AppState<S>, root_node: &str, error: &UploaderError) -> Response {
    let html = page::render(&PageView {
        database_url: &state.database_url,
        root_node,
        notice: Some(Notice::Error(error.user_friendly_message())),
        ..PageView::default()
    });
    (status_for(error), Html(html)).into_response()
}
