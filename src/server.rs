use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use image::RgbImage;
use tower_http::cors::CorsLayer;

use crate::{
    codec::{self, ImageBuffer},
    config::ServerConfig,
    error::StylizeError,
    gate::{InferenceGate, check_ratio},
    messages::{ErrorResponse, StatusResponse},
    model::StyleModel,
};

pub const WELCOME: &str = "Welcome to the Style Transfer API!";

const CONTENT_FIELD: &str = "content_image";
const STYLE_FIELD: &str = "style_image";
const STYLE_A_FIELD: &str = "style_image_1";
const STYLE_B_FIELD: &str = "style_image_2";
const RATIO_FIELD: &str = "style_ratio";

const DEFAULT_STYLE_RATIO: f32 = 1.0;
const DEFAULT_COMBINE_RATIO: f32 = 0.5;

/// State shared by every request handler.
pub struct AppState<M: StyleModel> {
    pub gate: Arc<InferenceGate<M>>,
    pub config: ServerConfig,
}

/// Builds the HTTP routes around a loaded gate.
pub fn router<M>(gate: Arc<InferenceGate<M>>, config: ServerConfig) -> Router
where
    M: StyleModel + Send + 'static,
{
    let body_limit = DefaultBodyLimit::max(config.max_upload_bytes);
    let state = Arc::new(AppState { gate, config });

    Router::new()
        .route("/", get(|| async { WELCOME }))
        .route("/stylize", post(post_stylize::<M>))
        .route("/combine-styles", post(post_combine_styles::<M>))
        .route("/status", get(get_status::<M>))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds to the configured address and serves until the process stops.
pub async fn serve<M>(gate: Arc<InferenceGate<M>>, config: ServerConfig) -> std::io::Result<()>
where
    M: StyleModel + Send + 'static,
{
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Listening on: {}", addr);
    axum::serve(listener, router(gate, config)).await
}

async fn post_stylize<M>(
    State(state): State<Arc<AppState<M>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, StylizeError>
where
    M: StyleModel + Send + 'static,
{
    let mut form = StyleForm::read(multipart).await?;
    let [content, style] = form.require([CONTENT_FIELD, STYLE_FIELD])?;
    let ratio = form.style_ratio(DEFAULT_STYLE_RATIO)?;

    log::info!("Processing images...");
    let gate = state.gate.clone();
    render(state.config.jpeg_quality, move || {
        let content = decode(&content)?;
        let style = codec::resize_style(&decode(&style)?);
        Ok(gate.run_inference_with_ratio(content, style, ratio)?)
    })
    .await
}

async fn post_combine_styles<M>(
    State(state): State<Arc<AppState<M>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, StylizeError>
where
    M: StyleModel + Send + 'static,
{
    let mut form = StyleForm::read(multipart).await?;
    let [content, style_a, style_b] = form.require([CONTENT_FIELD, STYLE_A_FIELD, STYLE_B_FIELD])?;
    let ratio = form.style_ratio(DEFAULT_COMBINE_RATIO)?;

    log::info!("Combining styles...");
    let gate = state.gate.clone();
    render(state.config.jpeg_quality, move || {
        let content = decode(&content)?;
        let style_a = codec::resize_style(&decode(&style_a)?);
        let style_b = codec::resize_style(&decode(&style_b)?);
        Ok(gate.combine_styles(content, style_a, style_b, ratio)?)
    })
    .await
}

async fn get_status<M>(State(state): State<Arc<AppState<M>>>) -> Json<StatusResponse>
where
    M: StyleModel + Send + 'static,
{
    Json(StatusResponse {
        status: state.gate.state().as_str().to_string(),
    })
}

// Decoding, inference and encoding are CPU bound and may block on the gate,
// so they run on the blocking pool, one worker thread per request.
async fn render<F>(quality: u8, job: F) -> Result<Response, StylizeError>
where
    F: FnOnce() -> Result<RgbImage, StylizeError> + Send + 'static,
{
    let jpeg = tokio::task::spawn_blocking(move || {
        let stylized = job()?;
        codec::encode_jpeg(&stylized, quality).map_err(StylizeError::Encode)
    })
    .await
    .map_err(|e| StylizeError::Worker(e.to_string()))??;

    log::info!("Style transfer completed");
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}

fn decode(bytes: &[u8]) -> Result<ImageBuffer, StylizeError> {
    codec::decode(bytes).map_err(StylizeError::Decode)
}

/// The parts of a multipart upload, keyed by name.
///
/// Only parts sent with a filename count as files, and the first file of a
/// given name wins. Parts without a filename are form values.
struct StyleForm {
    files: HashMap<String, Bytes>,
    values: HashMap<String, Bytes>,
}

impl StyleForm {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, StylizeError> {
        let mut multipart = multipart.map_err(|e| StylizeError::Validation(e.body_text()))?;

        let (mut files, mut values) = (HashMap::new(), HashMap::new());
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let is_file = field.file_name().is_some();
            let data = field.bytes().await?;
            let parts = if is_file { &mut files } else { &mut values };
            parts.entry(name).or_insert(data);
        }
        Ok(Self { files, values })
    }

    /// Takes the named files, failing if any of them was not uploaded.
    fn require<const N: usize>(&mut self, names: [&str; N]) -> Result<[Bytes; N], StylizeError> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.files.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(StylizeError::Validation(format!(
                "Please provide {} files (missing: {}).",
                names.join(", "),
                missing.join(", ")
            )));
        }
        Ok(names.map(|name| self.files.remove(name).unwrap_or_default()))
    }

    fn style_ratio(&self, default: f32) -> Result<f32, StylizeError> {
        let Some(raw) = self.values.get(RATIO_FIELD) else {
            return Ok(default);
        };
        let ratio = std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.trim().parse::<f32>().ok())
            .ok_or_else(|| StylizeError::Validation(format!("{RATIO_FIELD} must be a number")))?;
        check_ratio(ratio).map_err(|e| StylizeError::Validation(e.to_string()))?;
        Ok(ratio)
    }
}

impl StylizeError {
    fn status(&self) -> StatusCode {
        match self {
            StylizeError::Validation(_) => StatusCode::BAD_REQUEST,
            StylizeError::Multipart(e) => e.status(),
            StylizeError::Decode(_)
            | StylizeError::Inference(_)
            | StylizeError::Encode(_)
            | StylizeError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StylizeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Error during style transfer: {self}");
        } else {
            log::warn!("Rejected request: {self}");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
