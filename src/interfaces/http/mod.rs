use crate::application::IngestionUseCase;
use crate::domain::analysis::{AnovaInput, CorrelationInput, ErrorResponse, SubmissionResponse};
use crate::domain::error::{AppError, Result};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{
    dev::Server, get, http::StatusCode, post, web, App, HttpResponse, HttpServer, ResponseError,
};
use futures_util::TryStreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SAVED: &str = "Data saved successfully";
pub const EXCEL_SAVED: &str = "Excel processed and data saved";

/// Cap on the JSON `data` part of an upload form.
pub const MAX_METADATA_BYTES: usize = 64 * 1024;
const METADATA_TOO_LARGE: &str = "The 'data' part with the analysis details is too large.";

pub struct HttpState {
    pub ingestion: Arc<IngestionUseCase>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            message: self.reason(),
        })
    }
}

/// Log the failure at a level matching who caused it, then hand it to actix.
fn reject(context: &str, err: AppError) -> AppError {
    if err.is_client_error() {
        warn!(error = %err, "{} rejected", context);
    } else if !matches!(err, AppError::NotFound(_)) {
        error!(error = %err, "{} failed", context);
    }
    err
}

fn saved(id: i64, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(SubmissionResponse {
        id,
        message: message.to_string(),
    })
}

#[post("/anova/manual")]
async fn anova_manual(
    data: web::Data<HttpState>,
    req: web::Json<AnovaInput>,
) -> Result<HttpResponse> {
    let id = data
        .ingestion
        .submit_grouped_manual(req.into_inner())
        .await
        .map_err(|e| reject("Manual ANOVA submission", e))?;
    Ok(saved(id, SAVED))
}

#[post("/anova/excel")]
async fn anova_excel(data: web::Data<HttpState>, payload: Multipart) -> Result<HttpResponse> {
    let context = "ANOVA upload";
    let upload = read_upload(payload, data.ingestion.max_upload_bytes())
        .await
        .map_err(|e| reject(context, e))?;
    info!(file = %upload.file_name, size = upload.bytes.len(), "ANOVA upload received");

    data.ingestion
        .check_upload(&upload.bytes, &upload.file_name)
        .map_err(|e| reject(context, e))?;
    let input: AnovaInput = upload.metadata().map_err(|e| reject(context, e))?;
    let id = data
        .ingestion
        .submit_grouped_file(upload.bytes, &upload.file_name, input)
        .await
        .map_err(|e| reject(context, e))?;
    Ok(saved(id, EXCEL_SAVED))
}

#[get("/anova/{id}")]
async fn anova_by_id(data: web::Data<HttpState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let stored = data
        .ingestion
        .get_grouped(id)
        .await
        .map_err(|e| reject("ANOVA lookup", e))?;
    Ok(HttpResponse::Ok().json(stored))
}

#[post("/correlation/manual")]
async fn correlation_manual(
    data: web::Data<HttpState>,
    req: web::Json<CorrelationInput>,
) -> Result<HttpResponse> {
    let id = data
        .ingestion
        .submit_paired_manual(req.into_inner())
        .await
        .map_err(|e| reject("Manual correlation submission", e))?;
    Ok(saved(id, SAVED))
}

#[post("/correlation/excel")]
async fn correlation_excel(
    data: web::Data<HttpState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let context = "Correlation upload";
    let upload = read_upload(payload, data.ingestion.max_upload_bytes())
        .await
        .map_err(|e| reject(context, e))?;
    info!(file = %upload.file_name, size = upload.bytes.len(), "Correlation upload received");

    data.ingestion
        .check_upload(&upload.bytes, &upload.file_name)
        .map_err(|e| reject(context, e))?;
    let input: CorrelationInput = upload.metadata().map_err(|e| reject(context, e))?;
    let id = data
        .ingestion
        .submit_paired_file(upload.bytes, &upload.file_name, input)
        .await
        .map_err(|e| reject(context, e))?;
    Ok(saved(id, EXCEL_SAVED))
}

#[get("/correlation/{id}")]
async fn correlation_by_id(
    data: web::Data<HttpState>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let stored = data
        .ingestion
        .get_paired(id)
        .await
        .map_err(|e| reject("Correlation lookup", e))?;
    Ok(HttpResponse::Ok().json(stored))
}

/// The `data` and `file` parts of an upload form.
#[derive(Debug, Default)]
struct Upload {
    data: Option<String>,
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    fn metadata<T: DeserializeOwned>(&self) -> Result<T> {
        let Some(data) = self.data.as_deref() else {
            return Err(AppError::BadRequest(
                "The 'data' part with the analysis details is missing.".to_string(),
            ));
        };
        serde_json::from_str(data)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON data: {}", e)))
    }
}

async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload> {
    let mut upload = Upload::default();

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                    if upload.bytes.len() + chunk.len() > limit {
                        return Err(IngestionUseCase::upload_too_large(limit));
                    }
                    upload.bytes.extend_from_slice(&chunk);
                }
            }
            "data" => {
                let mut raw = Vec::new();
                while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                    if raw.len() + chunk.len() > MAX_METADATA_BYTES {
                        return Err(AppError::BadRequest(METADATA_TOO_LARGE.to_string()));
                    }
                    raw.extend_from_slice(&chunk);
                }
                let text = String::from_utf8(raw).map_err(|_| {
                    AppError::BadRequest("The 'data' part must be UTF-8 JSON.".to_string())
                })?;
                upload.data = Some(text);
            }
            _ => while field.try_next().await.map_err(multipart_error)?.is_some() {},
        }
    }

    Ok(upload)
}

fn multipart_error(err: actix_multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart payload: {}", err))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid JSON data: {}", err)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|_err, _req| {
        AppError::BadRequest("Invalid id".to_string()).into()
    }))
    .service(
        web::scope("/api")
            .service(anova_manual)
            .service(anova_excel)
            .service(anova_by_id)
            .service(correlation_manual)
            .service(correlation_excel)
            .service(correlation_by_id),
    );
}

pub fn start_server(
    ingestion: Arc<IngestionUseCase>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { ingestion });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
