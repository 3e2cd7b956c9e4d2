//! Serves the built dashboard. Unknown paths get `index.html` so client side routing works.

use crate::prelude::*;
use actix_files::{Files, NamedFile};
use actix_web::{
    dev::{fn_service, ServiceRequest, ServiceResponse},
    get,
    http::{Method, StatusCode},
    web, HttpResponse,
};
use serde_json::json;
use std::path::PathBuf;

const INDEX: &str = "index.html";
/// Paths owned by the API. These never fall back to the dashboard.
const RESERVED_PREFIXES: [&str; 4] = ["api/", "auth/", "events", "ws"];

fn is_reserved(path: &str) -> bool {
    RESERVED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

#[get("/")]
async fn banner() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Bella Bot API" }))
}

/// Runs when no static file matched the request.
async fn fallback(
    index_path: PathBuf,
    request: ServiceRequest,
) -> actix_web::Result<ServiceResponse> {
    let (request, _) = request.into_parts();
    let path = request.path().trim_start_matches('/');
    if request.method() != Method::GET || is_reserved(path) {
        let err = error(StatusCode::NOT_FOUND, "Not Found");
        return Ok(ServiceResponse::from_err(err, request));
    }
    let response = NamedFile::open_async(&index_path).await?.into_response(&request);
    Ok(ServiceResponse::new(request, response))
}

/// Mounts the dashboard when it has been built, otherwise `GET /` answers with a banner.
///
/// Must be registered after every other route, the dashboard claims the whole path space.
pub fn configure(static_dir: Option<PathBuf>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| match static_dir {
        Some(dir) => {
            let index_path = dir.join(INDEX);
            cfg.service(
                Files::new("/", dir)
                    .index_file(INDEX)
                    .default_handler(fn_service(move |request| {
                        fallback(index_path.clone(), request)
                    })),
            );
        }
        None => {
            cfg.service(banner);
        }
    }
}
