//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! El resto del pipeline sólo ve el trait [`Completer`], de modo que los
//! tests pueden inyectar un modelo falso sin red.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::Prompt;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::{AppConfig, LlmProvider};
use crate::error::{MindMapError, Result};

/// Etapa del pipeline que origina la llamada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStage {
    Extract { chunk_index: usize },
    Merge,
    SingleCall,
}

/// Petición de completado: preámbulo de sistema + mensaje de usuario.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub stage: CompletionStage,
    pub preamble: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

/// Punto de inyección del modelo de lenguaje.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Devuelve el texto crudo de la respuesta del modelo.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Limpia la respuesta del LLM para asegurar que solo contenga el JSON.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    text: String,
}

/// Gestor de LLMs y transcripción.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
    pub generation_model: String,
    pub transcription_model: String,
    pub timeout: Duration,
    openai_api_key: Option<String>,
    openai_base_url: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            generation_model: cfg.llm_generation_model.clone(),
            transcription_model: cfg.llm_transcription_model.clone(),
            timeout: cfg.llm_timeout,
            openai_api_key: cfg.openai_api_key.clone(),
            openai_base_url: cfg.openai_base_url.clone(),
        }
    }

    fn model_for(&self, stage: CompletionStage) -> &str {
        let configured = match stage {
            CompletionStage::SingleCall => self.generation_model.as_str(),
            _ => self.chat_model.as_str(),
        };
        if configured.is_empty() {
            "gpt-4o-mini"
        } else {
            configured
        }
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    /// Cliente de OpenAI construido con la clave y la URL base configuradas.
    fn openai_client(&self) -> Result<rig::providers::openai::Client> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .ok_or_else(|| MindMapError::upstream("Falta OPENAI_API_KEY en el entorno"))?;
        Ok(rig::providers::openai::Client::builder(api_key)
            .base_url(&self.openai_base_url)
            .build())
    }

    async fn complete_with_openai(&self, request: CompletionRequest) -> Result<String> {
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = self.openai_client()?;
        let model_name = self.model_for(request.stage);

        let agent = client
            .agent(model_name)
            .preamble(&request.preamble)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build();

        debug!("Llamando a {model_name} para {:?}", request.stage);
        let prompt = request.prompt;
        let call = async { agent.prompt(prompt.as_str()).await };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(e)) => {
                error!("Error de OpenAI en {:?}: {}", request.stage, e);
                Err(MindMapError::upstream(format!("OpenAI API error: {e}")))
            }
            Err(_) => Err(MindMapError::upstream(format!(
                "sin respuesta del modelo tras {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    // ---------------------------------------------------------------------
    // TRANSCRIPCIÓN
    // ---------------------------------------------------------------------

    /// Convierte una grabación de audio en texto.
    pub async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.transcribe_with_openai(audio, filename).await,
            ref other => Err(MindMapError::upstream(format!(
                "Proveedor LLM {:?} aún no implementado para transcripción",
                other
            ))),
        }
    }

    async fn transcribe_with_openai(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .ok_or_else(|| MindMapError::upstream("Falta OPENAI_API_KEY en el entorno"))?;

        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        let url = format!(
            "{}/audio/transcriptions",
            self.openai_base_url.trim_end_matches('/')
        );
        let call = reqwest::Client::new()
            .post(url)
            .bearer_auth(api_key)
            .multipart(form)
            .send();

        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| MindMapError::upstream("la transcripción superó el tiempo máximo"))??;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Error de transcripción ({status}): {body}");
            return Err(MindMapError::upstream(format!("OpenAI API error: {body}")));
        }

        let body: TranscriptionBody = response.json().await?;
        Ok(body.text)
    }
}

#[async_trait]
impl Completer for LlmManager {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(request).await,
            ref other => Err(MindMapError::upstream(format!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            ))),
        }
    }
}
