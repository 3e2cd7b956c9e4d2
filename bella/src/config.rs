use anyhow::Context;
use serde::Deserialize;
use std::{
    env,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use twilight_model::id::{marker::ApplicationMarker, Id};

const DEFAULT_ENV: &str = "dev";

#[derive(Debug, Deserialize, Clone)]
pub struct BellaConfig {
    pub redis: String,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub music: MusicConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub ai: AiConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub behaviors: BehaviorsConfig,

    #[serde(skip)]
    pub is_prod: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    pub application_id: Id<ApplicationMarker>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    pub bot_token: String,
    pub proxy: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MusicConfig {
    pub nodes: Vec<MusicNode>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MusicNode {
    pub identifier: String,
    pub host: String,
    pub port: u16,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub cookie_domain: Option<String>,
    /// Where the bot posts dashboard events. Usually `http://<web>/events`.
    pub events_url: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".to_owned(),
                "http://localhost:3000".to_owned(),
            ],
            static_dir: None,
            cookie_domain: None,
            events_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "AiConfig::default_model")]
    pub model: String,
    #[serde(default = "AiConfig::default_api_url")]
    pub api_url: String,
}

impl AiConfig {
    fn default_model() -> String {
        "gemini-pro".to_owned()
    }

    fn default_api_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_owned()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImageConfig {
    pub default_model: String,
    pub auth_token: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_model: "flux".to_owned(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BehaviorsConfig {
    pub path: PathBuf,
}

impl Default for BehaviorsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("behaviors.json"),
        }
    }
}

/// Loads the config for the bot from the environment specific JSON file, then applies any
/// secrets set in the process environment on top of it.
pub fn load_config() -> anyhow::Result<BellaConfig> {
    let (path, environment) = get_config_path_and_environment();

    let file = File::open(&path)
        .with_context(|| format!("Cannot open JSON config at {:?}", path))?;
    let reader = BufReader::new(file);
    let mut config: BellaConfig = simd_json::serde::from_reader(reader)
        .with_context(|| format!("Cannot parse JSON config at {:?}", path))?;

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    config.is_prod = environment != DEFAULT_ENV;
    Ok(config)
}

/// Overrides secrets with values found through `lookup`. Empty values are ignored.
pub fn apply_env_overrides(config: &mut BellaConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(token) = get("DISCORD_TOKEN") {
        config.discord.bot_token = token;
    }
    if let Some(client_id) = get("DISCORD_CLIENT_ID") {
        config.discord.client_id = client_id;
    }
    if let Some(secret) = get("DISCORD_CLIENT_SECRET") {
        config.discord.client_secret = secret;
    }
    if let Some(redirect) = get("DISCORD_REDIRECT_URI") {
        config.discord.redirect_uri = redirect;
    }
    if let Some(redis) = get("REDIS_URL") {
        config.redis = redis;
    }
    if let Some(key) = get("GEMINI_API_KEY") {
        config.ai.api_key = key;
    }
    if let Some(token) = get("POLLINATIONS_TOKEN") {
        config.image.auth_token = Some(token);
    }
    if let Some(model) = get("IMAGE_MODEL") {
        config.image.default_model = model;
    }
}

fn get_config_path_and_environment() -> (Box<Path>, String) {
    let execution_env: String = env::var("BELLA_ENV")
        .unwrap_or_else(|_| String::from(DEFAULT_ENV))
        .to_lowercase();
    if let Ok(path) = env::var("BELLA_CONFIG") {
        return (PathBuf::from(path).into_boxed_path(), execution_env);
    }
    let mut buffer: PathBuf = ["/etc", "bella"].iter().collect();
    buffer.push(&execution_env);
    (buffer.into_boxed_path(), execution_env)
}
