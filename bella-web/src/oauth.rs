use crate::{prelude::*, AppState};
use actix_web::{
    cookie::{Cookie, SameSite},
    get,
    http::StatusCode,
    post, web, HttpRequest, HttpResponse,
};
use bella::config::DiscordConfig;
use serde::{Deserialize, Serialize};
use time::Duration;

const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const COOKIE_KEY: &str = "discord_refresh_token";
const COOKIE_PATH: &str = "/auth/discord";
const SCOPES: &str = "identify guilds";

#[derive(Deserialize)]
struct TokenRequest {
    code: String,
}

#[derive(Serialize)]
struct DiscordTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    grant_type: &'a str,
}

#[derive(Serialize)]
struct DiscordRefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    refresh_token: &'a str,
    grant_type: &'a str,
    scope: &'a str,
}

#[derive(Serialize, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    // Kept in an http-only cookie instead of being handed to the page.
    #[serde(default, skip_serializing)]
    refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

/// Fails unless the client ID, secret and redirect URI are all configured.
fn credentials(config: &DiscordConfig) -> Result<&DiscordConfig> {
    let configured = [&config.client_id, &config.client_secret, &config.redirect_uri]
        .iter()
        .all(|value| !value.is_empty());
    if !configured {
        return http_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OAuth server misconfiguration",
        );
    }
    Ok(config)
}

fn refresh_cookie(refresh_token: String, domain: Option<&str>) -> Cookie<'static> {
    let mut cookie = Cookie::build(COOKIE_KEY, refresh_token)
        .path(COOKIE_PATH)
        .max_age(Duration::days(7))
        .same_site(SameSite::Strict)
        .http_only(true)
        .secure(true)
        .finish();
    if let Some(domain) = domain {
        cookie.set_domain(domain.to_owned());
    }
    cookie
}

async fn request_token(state: &AppState, form: impl Serialize) -> Result<TokenResponse> {
    let body = serde_urlencoded::to_string(form).http_internal_error("Failed to encode form")?;
    let mut response = state
        .http
        .post(TOKEN_URL)
        .insert_header(("Accept", "application/json"))
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .send_body(body)
        .await
        .http_error(StatusCode::BAD_GATEWAY, "Failed to reach Discord")?;

    if !response.status().is_success() {
        let text = response.body().await.unwrap_or_default();
        return http_error(
            StatusCode::BAD_GATEWAY,
            format!(
                "Discord token exchange failed: {}",
                String::from_utf8_lossy(&text)
            ),
        );
    }

    response
        .json()
        .await
        .http_error(StatusCode::BAD_GATEWAY, "Invalid token response from Discord")
}

fn token_response(state: &AppState, mut data: TokenResponse) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    if !data.refresh_token.is_empty() {
        let token = std::mem::take(&mut data.refresh_token);
        response.cookie(refresh_cookie(token, state.config.web.cookie_domain.as_deref()));
    }
    response.json(data)
}

#[post("/token")]
async fn exchange_token(
    state: web::Data<AppState>,
    request: web::Form<TokenRequest>,
) -> Result<HttpResponse> {
    let discord = credentials(&state.config.discord)?;
    let data = request_token(
        &state,
        DiscordTokenRequest {
            client_id: discord.client_id.as_str(),
            client_secret: discord.client_secret.as_str(),
            redirect_uri: discord.redirect_uri.as_str(),
            code: request.code.as_str(),
            grant_type: "authorization_code",
        },
    )
    .await?;
    Ok(token_response(&state, data))
}

#[get("/refresh")]
async fn refresh(state: web::Data<AppState>, request: HttpRequest) -> Result<HttpResponse> {
    let refresh_token = match request.cookie(COOKIE_KEY) {
        Some(ref cookie) => cookie.value().to_owned(),
        None => return unauthorized(),
    };

    let discord = credentials(&state.config.discord)?;
    let data = request_token(
        &state,
        DiscordRefreshRequest {
            client_id: discord.client_id.as_str(),
            client_secret: discord.client_secret.as_str(),
            redirect_uri: discord.redirect_uri.as_str(),
            refresh_token: refresh_token.as_str(),
            grant_type: "refresh_token",
            scope: SCOPES,
        },
    )
    .await?;
    Ok(token_response(&state, data))
}

#[post("/logout")]
async fn logout(state: web::Data<AppState>, request: HttpRequest) -> Result<HttpResponse> {
    if request.cookie(COOKIE_KEY).is_none() {
        return unauthorized();
    }
    let mut removal = refresh_cookie(String::new(), state.config.web.cookie_domain.as_deref());
    removal.make_removal();
    Ok(HttpResponse::NoContent().cookie(removal).finish())
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(exchange_token);
    cfg.service(refresh);
    cfg.service(logout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use actix_web::{test as web_test, App};
    use serde_json::json;

    #[test]
    fn test_refresh_cookie() {
        let cookie = refresh_cookie("secret".to_owned(), Some("bella.example"));
        assert_eq!(cookie.name(), COOKIE_KEY);
        assert_eq!(cookie.value(), "secret");
        assert_eq!(cookie.path(), Some(COOKIE_PATH));
        assert_eq!(cookie.domain(), Some("bella.example"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_token_response_hides_refresh_token() {
        let data: TokenResponse = serde_json::from_value(json!({
            "access_token": "access",
            "token_type": "Bearer",
            "refresh_token": "refresh",
            "expires_in": 604800,
        }))
        .unwrap();
        assert_eq!(data.refresh_token, "refresh");
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"access_token": "access", "token_type": "Bearer", "expires_in": 604800})
        );
    }

    #[actix_web::test]
    async fn test_token_without_oauth_config_fails() {
        let state = test_util::state().await;
        let app = web_test::init_service(App::new().app_data(state).configure(crate::api)).await;
        let request = web_test::TestRequest::post()
            .uri("/auth/discord/token")
            .set_form([("code", "abc")])
            .to_request();
        let response = web_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_refresh_and_logout_require_cookie() {
        let state = test_util::state().await;
        let app = web_test::init_service(App::new().app_data(state).configure(crate::api)).await;

        let request = web_test::TestRequest::get()
            .uri("/auth/discord/refresh")
            .to_request();
        let response = web_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = web_test::TestRequest::post()
            .uri("/auth/discord/logout")
            .to_request();
        let response = web_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_logout_clears_cookie() {
        let state = test_util::state().await;
        let app = web_test::init_service(App::new().app_data(state).configure(crate::api)).await;
        let request = web_test::TestRequest::post()
            .uri("/auth/discord/logout")
            .cookie(Cookie::new(COOKIE_KEY, "refresh"))
            .to_request();
        let response = web_test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let cleared = response
            .response()
            .cookies()
            .find(|cookie| cookie.name() == COOKIE_KEY)
            .expect("removal cookie");
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }
}
