use crate::config::Config;
use crate::engines::image::{normalize_data_url, OUTPUT_DPI, TARGET_HEIGHT, TARGET_WIDTH};
use crate::engines::{PopplerRasterizer, Rasterizer, FIRST_PAGE, RENDER_DPI};
use crate::error::{AppError, Result};
use crate::files::{save_upload, stream_then_delete, unique_prefix, EphemeralFile};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub rasterizer: Arc<dyn Rasterizer>,
    /// Cached at startup
    pub rasterizer_available: bool,
}

impl AppState {
    /// Build state around the poppler rasterizer named in `config`
    pub async fn new(config: Config) -> Self {
        let rasterizer = Arc::new(PopplerRasterizer::new(
            config.rasterizer_path.clone(),
            config.conversion_timeout(),
        ));
        Self::with_rasterizer(config, rasterizer).await
    }

    pub async fn with_rasterizer(config: Config, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let rasterizer_available = rasterizer.is_available().await;
        let status = if rasterizer_available { "✓" } else { "✗" };
        info!(
            "{} {} rasterizer ({})",
            status,
            rasterizer.name(),
            config.rasterizer_path.display()
        );

        Self {
            config,
            rasterizer,
            rasterizer_available,
        }
    }
}

fn is_pdf(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| {
            m.essence_str()
                .eq_ignore_ascii_case(mime::APPLICATION_PDF.essence_str())
        })
        .unwrap_or(false)
}

/// Render the first page of an uploaded PDF and return it as a PNG download.
///
/// The uploaded PDF is removed as soon as rendering finishes, successfully or
/// not. The PNG is removed once the response body has been sent.
pub async fn convert_pdf_handler(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let mut multipart = multipart?;
    let mut upload: Option<EphemeralFile> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !is_pdf(&content_type) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Invalid file type '{}'. Please upload a PDF file.",
                content_type
            )));
        }

        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        let saved = save_upload(field, &state.config.output_dir, "pdf").await?;
        info!("Received {} as {}", filename, saved.path().display());
        upload = Some(saved);
        break;
    }

    let pdf = upload.ok_or(AppError::NoFileProvided)?;

    let rendered = state
        .rasterizer
        .render_page(
            pdf.path(),
            FIRST_PAGE,
            RENDER_DPI,
            &unique_prefix(&state.config.output_dir),
        )
        .await;
    pdf.remove().await;

    let image = EphemeralFile::new(rendered?);
    let file = tokio::fs::File::open(image.path()).await?;
    let length = file.metadata().await?.len();
    let filename = image
        .path()
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("page.png")
        .to_string();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        stream_then_delete(file, image),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct EditedImageRequest {
    /// `data:<mime>;base64,<payload>`
    pub image_data: String,
}

/// Re-save an edited page at the print size and resolution
pub async fn save_edited_image_handler(
    payload: std::result::Result<Json<EditedImageRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    info!("Received edited image ({} bytes of data URL)", request.image_data.len());

    let png = tokio::task::spawn_blocking(move || normalize_data_url(&request.image_data))
        .await
        .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))??;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "pagecast",
        "rasterizer": state.rasterizer_available,
    }))
}

/// Information endpoint - describes the conversion routes
pub async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": "pagecast",
        "version": env!("CARGO_PKG_VERSION"),
        "rasterizer": {
            "name": state.rasterizer.name(),
            "available": state.rasterizer_available,
        },
        "render_dpi": RENDER_DPI,
        "edited_image": {
            "width": TARGET_WIDTH,
            "height": TARGET_HEIGHT,
            "dpi": OUTPUT_DPI,
        },
        "endpoints": {
            "convert_pdf": {
                "path": "/convert-pdf/",
                "method": "POST",
                "description": "Render the first page of a PDF to PNG at 400 DPI.",
                "content_type": "multipart/form-data",
                "fields": {
                    "file": "The PDF to render (required, content type application/pdf)"
                }
            },
            "save_edited_image": {
                "path": "/save-edited-image/",
                "method": "POST",
                "description": "Re-encode an edited page as a 3306x4678 RGB PNG at 400 DPI. Images of any other size are stretched to fit with nearest-neighbour sampling.",
                "content_type": "application/json",
                "fields": {
                    "image_data": "Data URL, e.g. data:image/png;base64,..."
                }
            },
            "health": {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            },
            "info": {
                "path": "/info",
                "method": "GET",
                "description": "Service information"
            }
        }
    }))
}
