use crate::{prelude::*, AppState};
use actix_web::{delete, get, http::StatusCode, post, web, HttpResponse};
use bella::behavior::BehaviorConfig;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct PersonaRequest {
    id: String,
    name: String,
    prompt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAssignment {
    user_id: String,
    persona_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignment {
    role: String,
    persona_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefaultPersona {
    persona_id: String,
}

#[derive(Deserialize)]
struct Guidelines {
    text: String,
}

fn success() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

fn success_with(config: BehaviorConfig) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "config": config }))
}

#[get("/config")]
async fn get_config(state: web::Data<AppState>) -> JsonResult<BehaviorConfig> {
    Ok(web::Json(state.behaviors.full_config().await))
}

#[post("/persona")]
async fn upsert_persona(
    state: web::Data<AppState>,
    request: web::Json<PersonaRequest>,
) -> Result<HttpResponse> {
    let PersonaRequest { id, name, prompt } = request.into_inner();
    if id.trim().is_empty() {
        return http_error(StatusCode::BAD_REQUEST, "Persona ID is required");
    }
    state
        .behaviors
        .upsert_persona(id, name, prompt)
        .await
        .http_internal_error("Failed to save persona")?;
    Ok(success_with(state.behaviors.full_config().await))
}

#[delete("/persona/{id}")]
async fn delete_persona(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    state
        .behaviors
        .delete_persona(&path.into_inner())
        .await
        .http_internal_error("Failed to delete persona")?;
    Ok(success_with(state.behaviors.full_config().await))
}

#[post("/assign/user")]
async fn assign_user(
    state: web::Data<AppState>,
    request: web::Json<UserAssignment>,
) -> Result<HttpResponse> {
    state
        .behaviors
        .assign_user(&request.user_id, request.persona_id.as_deref())
        .await
        .http_internal_error("Failed to assign persona")?;
    Ok(success())
}

#[post("/assign/role")]
async fn assign_role(
    state: web::Data<AppState>,
    request: web::Json<RoleAssignment>,
) -> Result<HttpResponse> {
    state
        .behaviors
        .assign_role(&request.role, request.persona_id.as_deref())
        .await
        .http_internal_error("Failed to assign persona")?;
    Ok(success())
}

#[post("/default")]
async fn set_default_persona(
    state: web::Data<AppState>,
    request: web::Json<DefaultPersona>,
) -> Result<HttpResponse> {
    state
        .behaviors
        .set_default_persona(request.into_inner().persona_id)
        .await
        .http_internal_error("Failed to set the default persona")?;
    Ok(success())
}

#[post("/guidelines")]
async fn set_guidelines(
    state: web::Data<AppState>,
    request: web::Json<Guidelines>,
) -> Result<HttpResponse> {
    state
        .behaviors
        .set_global_guidelines(request.into_inner().text)
        .await
        .http_internal_error("Failed to save guidelines")?;
    Ok(success())
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(get_config);
    cfg.service(upsert_persona);
    cfg.service(delete_persona);
    cfg.service(assign_user);
    cfg.service(assign_role);
    cfg.service(set_default_persona);
    cfg.service(set_guidelines);
}

#[cfg(test)]
mod tests {
    use crate::test_util;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(crate::api)).await
        };
    }

    #[actix_web::test]
    async fn test_get_config_returns_defaults() {
        let state = test_util::state().await;
        let app = app!(state);
        let request = test::TestRequest::get()
            .uri("/api/behaviors/config")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["default_persona"], "default");
        assert_eq!(body["personas"], json!({}));
        assert_eq!(body["assignments"], json!({"users": {}, "roles": {}}));
    }

    #[actix_web::test]
    async fn test_upsert_and_delete_persona() {
        let state = test_util::state().await;
        let app = app!(state);

        let request = test::TestRequest::post()
            .uri("/api/behaviors/persona")
            .set_json(json!({"id": "pirate", "name": "Pirate", "prompt": "Talk like a pirate."}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["config"]["personas"]["pirate"]["name"], "Pirate");

        let request = test::TestRequest::delete()
            .uri("/api/behaviors/persona/pirate")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert!(body["config"]["personas"].get("pirate").is_none());
    }

    #[actix_web::test]
    async fn test_persona_without_id_is_rejected() {
        let state = test_util::state().await;
        let app = app!(state);
        let request = test::TestRequest::post()
            .uri("/api/behaviors/persona")
            .set_json(json!({"id": " ", "name": "Nobody", "prompt": "..."}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_assignments_resolve() {
        let state = test_util::state().await;
        let app = app!(state);

        for (uri, body) in [
            (
                "/api/behaviors/persona",
                json!({"id": "mod", "name": "Mod", "prompt": "Be strict."}),
            ),
            (
                "/api/behaviors/assign/role",
                json!({"role": "Moderator", "personaId": "mod"}),
            ),
            (
                "/api/behaviors/assign/user",
                json!({"userId": "42", "personaId": "default"}),
            ),
            ("/api/behaviors/guidelines", json!({"text": "Be kind."})),
        ] {
            let request = test::TestRequest::post().uri(uri).set_json(body).to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }

        let config = state.behaviors.full_config().await;
        assert_eq!(config.assignments.roles["Moderator"], "mod");
        assert_eq!(config.assignments.users["42"], "default");
        assert!(state.behaviors.resolve("7", ["Moderator"]).await.starts_with("Be strict."));

        // An empty persona clears the assignment.
        let request = test::TestRequest::post()
            .uri("/api/behaviors/assign/user")
            .set_json(json!({"userId": "42", "personaId": ""}))
            .to_request();
        test::call_service(&app, request).await;
        assert!(state.behaviors.full_config().await.assignments.users.is_empty());
    }

    #[actix_web::test]
    async fn test_set_default_persona() {
        let state = test_util::state().await;
        let app = app!(state);
        let request = test::TestRequest::post()
            .uri("/api/behaviors/default")
            .set_json(json!({"personaId": "missing"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body, json!({"success": true}));
        assert_eq!(state.behaviors.full_config().await.default_persona, "missing");
    }
}
