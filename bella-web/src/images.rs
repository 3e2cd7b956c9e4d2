use crate::{prelude::*, AppState};
use actix_web::{get, http::StatusCode, post, web, HttpResponse};
use bella::image::{self, ImageRequest};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct ModelQuery {
    model: String,
}

#[get("/models")]
async fn get_models(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "models": image::MODELS,
        "current_model": state.images.current_model(),
    }))
}

#[post("/model")]
async fn set_model(
    state: web::Data<AppState>,
    query: web::Query<ModelQuery>,
) -> Result<HttpResponse> {
    if !state.images.set_model(&query.model) {
        return http_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid model. Choose from: {}", image::MODELS.join(", ")),
        );
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "model": query.model })))
}

#[post("/generate")]
async fn generate(
    state: web::Data<AppState>,
    request: web::Json<ImageRequest>,
) -> Result<HttpResponse> {
    if let Err(err) = request.validate() {
        return http_error(StatusCode::BAD_REQUEST, err);
    }

    let image_url = state.images.generate_url(&request);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "image_url": image_url,
        "prompt": request.prompt,
        "model": state.images.model_for(&request),
        "width": request.width,
        "height": request.height,
    })))
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(get_models);
    cfg.service(set_model);
    cfg.service(generate);
}

#[cfg(test)]
mod tests {
    use crate::test_util;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_models_and_switching() {
        let state = test_util::state().await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(crate::api)).await;

        let request = test::TestRequest::get().uri("/api/image/models").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            body,
            json!({"models": ["flux", "turbo", "stable-diffusion"], "current_model": "flux"})
        );

        let request = test::TestRequest::post()
            .uri("/api/image/model?model=turbo")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body, json!({"success": true, "model": "turbo"}));
        assert_eq!(state.images.current_model(), "turbo");

        let request = test::TestRequest::post()
            .uri("/api/image/model?model=midjourney")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.images.current_model(), "turbo");
    }

    #[actix_web::test]
    async fn test_generate() {
        let state = test_util::state().await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(crate::api)).await;

        let request = test::TestRequest::post()
            .uri("/api/image/generate")
            .set_json(json!({"prompt": "a red fox", "width": 512}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["model"], "flux");
        assert_eq!(body["width"], 512);
        assert_eq!(body["height"], 1024);
        assert_eq!(
            body["image_url"],
            "https://image.pollinations.ai/prompt/a%20red%20fox\
             ?model=flux&width=512&height=1024&nologo=true&enhance=false"
        );
    }

    #[actix_web::test]
    async fn test_generate_rejects_bad_requests() {
        let state = test_util::state().await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(crate::api)).await;

        for body in [
            json!({"width": 512}),
            json!({"prompt": "   "}),
            json!({"prompt": "fox", "width": 100}),
            json!({"prompt": "fox", "height": 4096}),
        ] {
            let request = test::TestRequest::post()
                .uri("/api/image/generate")
                .set_json(&body)
                .to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        }
    }
}
