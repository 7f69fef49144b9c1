use config::Config;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root directory for per-owner artifacts (threads, references,
    /// transcripts, profile, token).
    pub data_dir: String,
    /// Maximum threads fetched per handshake run.
    pub max_threads: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
    pub chat_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub url: String,
}

/// Weights and cut-off for one ranking consumer. Weights are passed through
/// to the ranking engine as-is, without clamping.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingProfile {
    pub top_k: usize,
    pub weight_recency: f64,
    pub weight_length: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    /// Token budget for assembled prompt context.
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    api: ApiConfig,
    model: ModelConfig,
    embedding: EmbeddingConfig,
    index: IndexConfig,
    profile: RankingProfile,
    style: RankingProfile,
    context: ContextConfig,
    frontend: FrontendConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub api: ApiConfig,
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub profile: RankingProfile,
    pub style: RankingProfile,
    pub context: ContextConfig,
    pub frontend: FrontendConfig,
    /// Key used to encrypt mailbox tokens at rest.
    pub token_key: String,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nModel: {:?}\n\nEmbedding: {:?}\n\nIndex: {:?}\n\nProfile ranking: {:?}\n\nStyle ranking: {:?}\n\nContext: {:?}\n\nFrontend: {:?}",
            self.settings,
            self.model,
            self.embedding,
            self.index,
            self.profile,
            self.style,
            self.context,
            self.frontend,
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            api,
            model,
            embedding,
            index,
            profile,
            style,
            context,
            frontend,
        } = cfg_file;

        let token_key =
            env::var("TOKEN_ENCRYPTION_KEY").expect("TOKEN_ENCRYPTION_KEY is required");

        ServerConfig {
            settings,
            api,
            model,
            embedding,
            index,
            profile,
            style,
            context,
            frontend,
            token_key,
        }
    };
}
