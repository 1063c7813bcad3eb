//! Carga y gestión de configuración de la aplicación (servidor, LLM,
//! almacenamiento y parámetros del pipeline).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::chunker::DEFAULT_MAX_CHUNK_TOKENS;
use crate::layout::DEFAULT_LEVEL_SPACING;

/// Límite de subida por defecto: 25 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Neo4j,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "neo4j" => Ok(Self::Neo4j),
            other => Err(anyhow!("Backend de almacenamiento no soportado: {other}")),
        }
    }
}

/// Estrategia de generación por defecto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// Trocear → extraer por trozo → fusionar → layout de árbol.
    Pipeline,
    /// Una única llamada que devuelve nodos con nivel y aristas.
    SingleCall,
}

impl GenerationStrategy {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pipeline" => Ok(Self::Pipeline),
            "single-call" | "single_call" => Ok(Self::SingleCall),
            other => Err(anyhow!("Estrategia de generación no soportada: {other}")),
        }
    }
}

/// Credenciales de Neo4j (sólo con `STORAGE_BACKEND=neo4j`).
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub frontend_dir: String,
    pub open_browser: bool,

    pub storage_backend: StorageBackend,
    pub neo4j: Option<Neo4jConfig>,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,
    pub llm_generation_model: String,
    pub llm_transcription_model: String,
    pub llm_timeout: Duration,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,

    pub max_chunk_tokens: usize,
    pub level_spacing: f64,
    pub generation_strategy: GenerationStrategy,

    /// Tamaño máximo de un cuerpo de petición o de un PDF descargado.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3322".to_string(),
            frontend_dir: "frontend".to_string(),
            open_browser: true,
            storage_backend: StorageBackend::Memory,
            neo4j: None,
            llm_provider: LlmProvider::OpenAI,
            llm_chat_model: "gpt-4o-mini".to_string(),
            llm_generation_model: "gpt-4o".to_string(),
            llm_transcription_model: "whisper-1".to_string(),
            llm_timeout: Duration::from_secs(120),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
            level_spacing: DEFAULT_LEVEL_SPACING,
            generation_strategy: GenerationStrategy::Pipeline,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que [`AppConfig::from_env`] pero con una fuente de variables
    /// arbitraria.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(v) => StorageBackend::from_str(&v)?,
            None => defaults.storage_backend.clone(),
        };

        let neo4j = if storage_backend == StorageBackend::Neo4j {
            Some(Neo4jConfig {
                uri: var("NEO4J_URI").ok_or_else(|| anyhow!("Falta NEO4J_URI en el entorno"))?,
                user: var("NEO4J_USER").ok_or_else(|| anyhow!("Falta NEO4J_USER en el entorno"))?,
                password: var("NEO4J_PASSWORD")
                    .ok_or_else(|| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            })
        } else {
            None
        };

        let llm_provider = match var("LLM_PROVIDER") {
            Some(v) => LlmProvider::from_str(&v)?,
            None => defaults.llm_provider.clone(),
        };

        let generation_strategy = match var("GENERATION_STRATEGY") {
            Some(v) => GenerationStrategy::from_str(&v)?,
            None => defaults.generation_strategy,
        };

        let llm_timeout = match var("LLM_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("LLM_TIMEOUT_SECS inválido: {v}"))?,
            ),
            None => defaults.llm_timeout,
        };

        let max_chunk_tokens = match var("MAX_CHUNK_TOKENS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_CHUNK_TOKENS inválido: {v}"))?,
            None => defaults.max_chunk_tokens,
        };
        if max_chunk_tokens == 0 {
            return Err(anyhow!("MAX_CHUNK_TOKENS debe ser mayor que 0"));
        }

        let level_spacing = match var("LAYOUT_LEVEL_SPACING") {
            Some(v) => v
                .parse()
                .with_context(|| format!("LAYOUT_LEVEL_SPACING inválido: {v}"))?,
            None => defaults.level_spacing,
        };
        if !(level_spacing.is_finite() && level_spacing > 0.0) {
            return Err(anyhow!("LAYOUT_LEVEL_SPACING debe ser un número positivo"));
        }

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES inválido: {v}"))?,
            None => defaults.max_upload_bytes,
        };
        if max_upload_bytes == 0 {
            return Err(anyhow!("MAX_UPLOAD_BYTES debe ser mayor que 0"));
        }

        let open_browser = match var("OPEN_BROWSER") {
            Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
            None => defaults.open_browser,
        };

        Ok(Self {
            server_addr: var("SERVER_ADDR").unwrap_or(defaults.server_addr),
            frontend_dir: var("FRONTEND_DIR").unwrap_or(defaults.frontend_dir),
            open_browser,
            storage_backend,
            neo4j,
            llm_provider,
            llm_chat_model: var("LLM_CHAT_MODEL").unwrap_or(defaults.llm_chat_model),
            llm_generation_model: var("LLM_GENERATION_MODEL")
                .unwrap_or(defaults.llm_generation_model),
            llm_transcription_model: var("LLM_TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.llm_transcription_model),
            llm_timeout,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            max_chunk_tokens,
            level_spacing,
            generation_strategy,
            max_upload_bytes,
        })
    }
}
