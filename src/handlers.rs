// src/handlers.rs
use crate::services::RawParameters;
use crate::{AppState, errors::TryOnError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, http::header, web};
use base64::{Engine as _, engine::general_purpose};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{error, info};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/tryon", web::post().to(try_on))
            .route("/results/{request_id}", web::get().to(get_result)),
    )
    .route("/healthz", web::get().to(health_check));
}

struct TryOnUpload {
    person: Option<ImageInput>,
    garments: Vec<ImageInput>,
    fields: HashMap<String, String>,
}

async fn read_upload(mut payload: Multipart) -> Result<TryOnUpload, TryOnError> {
    let mut upload = TryOnUpload {
        person: None,
        garments: Vec::new(),
        fields: HashMap::new(),
    };
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > MAX_UPLOAD_BYTES {
                return Err(TryOnError::PayloadTooLarge(
                    "10MB max per request".to_string(),
                ));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "person_image" => {
                info!("Received person image ({:?}, {} bytes)", content_type, data.len());
                upload.person = Some(ImageInput::new(data.to_vec(), content_type));
            }
            "garment_image" => {
                info!("Received garment image ({:?}, {} bytes)", content_type, data.len());
                upload.garments.push(ImageInput::new(data.to_vec(), content_type));
            }
            _ => {
                let value = String::from_utf8(data.to_vec()).map_err(|_| {
                    TryOnError::Validation(format!("field {} is not valid UTF-8", name))
                })?;
                upload.fields.insert(name, value);
            }
        }
    }

    Ok(upload)
}

pub async fn try_on(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TryOnError> {
    let upload = read_upload(payload).await?;

    let person = upload
        .person
        .filter(|p| !p.data.is_empty())
        .ok_or_else(|| TryOnError::Validation("person image is required".to_string()))?;

    if upload.garments.is_empty() {
        return Err(TryOnError::Validation(
            "at least one garment image is required".to_string(),
        ));
    }

    let parameters = RawParameters::from_form(&upload.fields);

    // Dropping the handler future (client went away) cancels the generation.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let output = data
        .orchestrator
        .execute(person, upload.garments, &parameters, &cancel)
        .await
        .map_err(|e| {
            error!("Virtual try-on failed: {}", e);
            e
        })?;

    let images: Vec<_> = output
        .images
        .iter()
        .enumerate()
        .map(|(i, img)| {
            serde_json::json!({
                "id": format!("image_{}", i),
                "data": general_purpose::STANDARD.encode(&img.data),
                "type": img.mime_type,
            })
        })
        .collect();

    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store, max-age=0"))
        .json(serde_json::json!({
            "success": true,
            "request_id": output.request_id,
            "images": images
        })))
}

pub async fn get_result(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TryOnError> {
    let request_id = RequestId::from(path.into_inner());

    let result = data.store.find_result_by_request_id(&request_id).await?;

    let formats: Vec<_> = result
        .images
        .iter()
        .map(|img| img.format().mime_type())
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "request_id": result.request_id,
        "result_id": result.id.as_str(),
        "image_count": result.images.len(),
        "formats": formats,
        "created_at": result.created_at
    })))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
