use std::path::Path as FsPath;

use axum::{
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, FromRequest, Json, Multipart, Path, Query,
        Request, State,
    },
    http::{header, StatusCode},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    chunker,
    error::{MindMapError, Result},
    generator::{self, DEFAULT_DOCUMENT_TITLE},
    models::{MindMapRecord, MindMapStructure, NewMindMap, RawDocument, SourceKind},
    source, validator,
};

/// Usuario asignado a los mapas creados sin `userId`.
pub const DEFAULT_USER_ID: &str = "anonymous";

const MAX_TITLE_CHARS: usize = 50;

type ApiError = (StatusCode, Json<Value>);

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct GeneratePayload {
    content: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
pub struct ParsePdfPayload {
    #[serde(rename = "base64PDF")]
    base64_pdf: Option<String>,
}

#[derive(Deserialize)]
pub struct SummarizePayload {
    chunks: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPdfPayload {
    pdf_url: Option<String>,
    title: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct VoicePayload {
    audio: Option<String>,
    filename: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMindMapPayload {
    content: Option<String>,
    title: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateMindMapPayload {
    content: Option<Value>,
    title: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Fichero y campos de un formulario multipart de `/process-pdf`.
#[derive(Default)]
struct Upload {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
    title: Option<String>,
    user_id: Option<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/generate-mindmap", post(generate_mindmap_handler))
        .route("/parse-pdf", post(parse_pdf_handler))
        .route("/summarize-chunks", post(summarize_chunks_handler))
        .route("/process-pdf", post(process_pdf_handler))
        .route("/voice-to-text", post(voice_to_text_handler))
        .route(
            "/api/mindmaps",
            get(list_mindmaps_handler).post(create_mindmap_handler),
        )
        .route(
            "/api/mindmaps/:id",
            get(get_mindmap_handler)
                .put(update_mindmap_handler)
                .delete(delete_mindmap_handler),
        )
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}

// --- Errores ---

fn api_error(err: MindMapError) -> ApiError {
    error!("{}", err);
    let status = match err {
        MindMapError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

/// Como [`api_error`], para endpoints cuya respuesta de éxito lleva `status`.
fn status_error(err: MindMapError) -> ApiError {
    let (status, Json(mut body)) = api_error(err);
    body["status"] = json!("error");
    (status, Json(body))
}

/// Cuerpo JSON ilegible, con tipos erróneos o demasiado grande.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| MindMapError::input(e.body_text()))
}

fn require(field: Option<String>, what: &str) -> Result<String> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MindMapError::input(format!("No se proporcionó {what}")))
}

// --- Títulos ---

/// Primera línea no vacía del contenido, recortada a 50 caracteres.
pub fn derive_title(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_TITLE_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_DOCUMENT_TITLE.to_string())
}

fn explicit_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// --- Handlers del pipeline ---

#[axum::debug_handler]
async fn generate_mindmap_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GeneratePayload>, JsonRejection>,
) -> std::result::Result<Json<MindMapStructure>, ApiError> {
    let payload = json_body(payload).map_err(api_error)?;
    let content = require(payload.content, "contenido").map_err(api_error)?;
    let title = explicit_title(payload.title).unwrap_or_else(|| derive_title(&content));

    info!("Generando mapa mental con la estrategia '{}'", state.generator.name());
    state
        .generator
        .generate(&content, &title)
        .await
        .map(Json)
        .map_err(api_error)
}

#[axum::debug_handler]
async fn parse_pdf_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ParsePdfPayload>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let payload = json_body(payload).map_err(status_error)?;
    let parsed = async {
        let pdf = require(payload.base64_pdf, "contenido PDF")?;
        let document = source::pdf_from_base64(&pdf).await?;
        chunker::chunk_text(&document.text, state.config.max_chunk_tokens)
    }
    .await
    .map_err(status_error)?;

    let total_tokens: usize = parsed.iter().map(|c| c.estimated_tokens).sum();
    let chunks: Vec<String> = parsed.into_iter().map(|c| c.text).collect();
    info!("PDF troceado en {} partes (~{} tokens)", chunks.len(), total_tokens);

    Ok(Json(json!({
        "chunks": chunks,
        "totalTokens": total_tokens,
        "status": "success",
    })))
}

#[axum::debug_handler]
async fn summarize_chunks_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SummarizePayload>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let chunks = json_body(payload).map_err(status_error)?.chunks.unwrap_or_default();
    let summary = state
        .summarizer
        .summarize_texts(&chunks)
        .await
        .map_err(status_error)?;

    Ok(Json(json!({ "summary": summary, "status": "success" })))
}

/// Acepta `{pdfUrl, title?, userId?}` en JSON o un formulario multipart con
/// `file` (PDF, audio o texto), `title` y `userId`.
#[axum::debug_handler]
async fn process_pdf_handler(
    State(state): State<AppState>,
    request: Request,
) -> std::result::Result<Json<Value>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (document, title, user_id) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| status_error(MindMapError::input(e.to_string())))?;
        let upload = read_upload(multipart).await.map_err(status_error)?;
        let title = explicit_title(upload.title.clone())
            .or_else(|| upload.filename.as_deref().and_then(file_stem));
        let user_id = upload.user_id.clone();
        let document = document_from_upload(&state, upload)
            .await
            .map_err(status_error)?;
        (document, title, user_id)
    } else {
        let payload = json_body(Json::<ProcessPdfPayload>::from_request(request, &state).await)
            .map_err(status_error)?;
        let raw_url = require(payload.pdf_url, "pdfUrl").map_err(status_error)?;
        let url = source::parse_pdf_url(&raw_url).map_err(status_error)?;
        let title = explicit_title(payload.title).or_else(|| source::title_from_url(&url));
        let document = source::pdf_from_url(
            url.as_str(),
            state.config.max_upload_bytes,
            state.config.llm_timeout,
        )
        .await
        .map_err(status_error)?;
        (document, title, payload.user_id)
    };

    let new = NewMindMap {
        title: title.unwrap_or_else(|| DEFAULT_DOCUMENT_TITLE.to_string()),
        content: MindMapStructure::default(),
        user_id: user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    };
    let record = process_document(&state, document, new)
        .await
        .map_err(status_error)?;

    Ok(Json(json!({ "status": "success", "data": record })))
}

#[axum::debug_handler]
async fn voice_to_text_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<VoicePayload>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let payload = json_body(payload).map_err(api_error)?;
    let transcribed = async {
        let audio = source::decode_base64(&require(payload.audio, "audio")?)?;
        let filename = payload.filename.unwrap_or_else(|| "audio.webm".to_string());
        source::audio_from_bytes(&state.llm_manager, audio, &filename).await
    }
    .await
    .map_err(api_error)?;

    Ok(Json(json!({ "text": transcribed.text })))
}

// --- Handlers de documentos ---

#[axum::debug_handler]
async fn list_mindmaps_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> std::result::Result<Json<Vec<MindMapRecord>>, ApiError> {
    state
        .store
        .list(params.user_id.as_deref())
        .await
        .map(Json)
        .map_err(api_error)
}

#[axum::debug_handler]
async fn create_mindmap_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateMindMapPayload>, JsonRejection>,
) -> std::result::Result<Json<MindMapRecord>, ApiError> {
    let payload = json_body(payload).map_err(api_error)?;
    let content = require(payload.content, "contenido").map_err(api_error)?;
    let title = explicit_title(payload.title).unwrap_or_else(|| derive_title(&content));

    let structure = state
        .generator
        .generate(&content, &title)
        .await
        .map_err(api_error)?;

    state
        .store
        .create(NewMindMap {
            title,
            content: structure,
            user_id: payload
                .user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
        })
        .await
        .map(Json)
        .map_err(api_error)
}

#[axum::debug_handler]
async fn get_mindmap_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<MindMapRecord>, ApiError> {
    state.store.get(id).await.map(Json).map_err(api_error)
}

#[axum::debug_handler]
async fn update_mindmap_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<UpdateMindMapPayload>, JsonRejection>,
) -> std::result::Result<Json<MindMapRecord>, ApiError> {
    let payload = json_body(payload).map_err(api_error)?;
    let content = payload
        .content
        .ok_or_else(|| MindMapError::input("No se proporcionó contenido"))
        .and_then(|value| validator::validate_value(&value))
        .map_err(api_error)?;

    state
        .store
        .update(id, explicit_title(payload.title), content)
        .await
        .map(Json)
        .map_err(api_error)
}

#[axum::debug_handler]
async fn delete_mindmap_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> std::result::Result<StatusCode, ApiError> {
    state.store.delete(id).await.map_err(api_error)?;
    info!("Mapa mental {} eliminado", id);
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn health_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<Value>, ApiError> {
    state.store.health().await.map_err(api_error)?;
    Ok(Json(json!({
        "status": "ok",
        "strategy": state.generator.name(),
        "storage": state.store.backend(),
    })))
}

// --- Utilidades ---

/// Trocea, resume, posiciona y persiste un documento ya extraído.
async fn process_document(
    state: &AppState,
    document: RawDocument,
    mut new: NewMindMap,
) -> Result<MindMapRecord> {
    info!(
        "Procesando documento {:?} de {} caracteres",
        document.source,
        document.text.chars().count()
    );
    let chunks = chunker::chunk_text(&document.text, state.config.max_chunk_tokens)?;
    let summary = state.summarizer.summarize(&chunks).await?;
    new.content =
        generator::structure_from_summary(summary, &new.title, state.config.level_spacing)?;
    state.store.create(new).await
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MindMapError::input(format!("Formulario inválido: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.filename = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| MindMapError::input(format!("No se pudo leer el fichero: {e}")))?
                    .to_vec();
                has_file = true;
            }
            "title" | "userId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| MindMapError::input(format!("Campo '{name}' inválido: {e}")))?;
                if name == "title" {
                    upload.title = Some(value);
                } else {
                    upload.user_id = Some(value);
                }
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(MindMapError::input("No se proporcionó ningún fichero"));
    }
    Ok(upload)
}

async fn document_from_upload(state: &AppState, upload: Upload) -> Result<RawDocument> {
    let kind = source::detect_source(upload.filename.as_deref(), upload.content_type.as_deref());
    match kind {
        SourceKind::Pdf => source::pdf_from_bytes(upload.bytes).await,
        SourceKind::Audio => {
            let filename = upload.filename.as_deref().unwrap_or("audio.webm");
            source::audio_from_bytes(&state.llm_manager, upload.bytes, filename).await
        }
        SourceKind::Plain => source::plain_from_bytes(upload.bytes),
    }
}

fn file_stem(filename: &str) -> Option<String> {
    FsPath::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::llm::{testing::ScriptedCompleter, LlmManager};
    use crate::store::MemoryStore;

    const RUST_TOPICS: &str = r#"{"topics":[{"title":"Rust","subtopics":[{"title":"Ownership"},{"title":"Traits"}]}]}"#;

    fn test_state(response: &str) -> AppState {
        let cfg = AppConfig::default();
        AppState::new(
            cfg.clone(),
            LlmManager::from_config(&cfg),
            Arc::new(ScriptedCompleter::fixed(response)),
            Arc::new(MemoryStore::default()),
        )
    }

    /// Envía un POST JSON a través del router completo.
    async fn post_json(state: AppState, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn create_payload(content: &str, user: &str) -> CreateMindMapPayload {
        CreateMindMapPayload {
            content: Some(content.to_string()),
            title: None,
            user_id: Some(user.to_string()),
        }
    }

    #[test]
    fn titles_come_from_the_first_line() {
        assert_eq!(derive_title("\n  Apuntes de Rust  \nmás texto"), "Apuntes de Rust");
        assert_eq!(derive_title(&"x".repeat(80)).chars().count(), 50);
        assert_eq!(derive_title("   \n "), DEFAULT_DOCUMENT_TITLE);
        assert_eq!(explicit_title(Some("  ".into())), None);
        assert_eq!(file_stem("informe.final.pdf").as_deref(), Some("informe.final"));
    }

    #[tokio::test]
    async fn generate_returns_a_positioned_graph() {
        let state = test_state(RUST_TOPICS);
        let Json(structure) = generate_mindmap_handler(
            State(state),
            Ok(Json(GeneratePayload {
                content: Some("Rust es un lenguaje de sistemas.".into()),
                title: None,
            })),
        )
        .await
        .unwrap();

        assert_eq!(structure.nodes.len(), 3);
        assert_eq!(structure.edges.len(), 2);
        assert_eq!(structure.nodes[0].label, "Rust");
        assert_eq!(structure.nodes[0].position.x, 0.0);
        assert_eq!(structure.nodes[0].position.y, 0.0);
    }

    #[tokio::test]
    async fn missing_content_is_a_500_with_message() {
        let (status, Json(body)) = generate_mindmap_handler(
            State(test_state(RUST_TOPICS)),
            Ok(Json(GeneratePayload {
                content: None,
                title: None,
            })),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("contenido"));
    }

    #[tokio::test]
    async fn unreadable_json_bodies_are_a_500_with_message() {
        let (status, body) =
            post_json(test_state(RUST_TOPICS), "/generate-mindmap", "esto no es json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());

        let (status, body) =
            post_json(test_state(RUST_TOPICS), "/generate-mindmap", r#"{"content": 5}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("content"), "{body}");

        let (status, body) =
            post_json(test_state(RUST_TOPICS), "/summarize-chunks", r#"{"chunks": "uno"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["error"].is_string());

        let (status, body) =
            post_json(test_state(RUST_TOPICS), "/api/mindmaps", "{\"content\":").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn bodies_over_the_upload_limit_are_a_500_with_message() {
        let cfg = AppConfig {
            max_upload_bytes: 1024,
            ..AppConfig::default()
        };
        let state = AppState::new(
            cfg.clone(),
            LlmManager::from_config(&cfg),
            Arc::new(ScriptedCompleter::fixed(RUST_TOPICS)),
            Arc::new(MemoryStore::default()),
        );
        let body = json!({ "base64PDF": "A".repeat(4096) }).to_string();

        let (status, body) = post_json(state, "/parse-pdf", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn multi_megabyte_chunks_fit_under_the_default_limit() {
        let chunk = "Rust y sus traits. ".repeat(3 * 1024 * 1024 / 19);
        let body = json!({ "chunks": [chunk] }).to_string();
        assert!(body.len() > 2 * 1024 * 1024);

        let (status, body) = post_json(test_state(RUST_TOPICS), "/summarize-chunks", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["summary"]["topics"][0]["title"], "Rust");
    }

    #[tokio::test]
    async fn blank_user_id_is_stored_as_anonymous() {
        let state = test_state(RUST_TOPICS);
        let Json(created) = create_mindmap_handler(
            State(state.clone()),
            Ok(Json(create_payload("Notas sobre Rust", "   "))),
        )
        .await
        .unwrap();
        assert_eq!(created.user_id, DEFAULT_USER_ID);

        let listed = assert_ok!(state.store.list(Some(DEFAULT_USER_ID)).await);
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn summarize_chunks_reports_status() {
        let Json(body) = summarize_chunks_handler(
            State(test_state(RUST_TOPICS)),
            Ok(Json(SummarizePayload {
                chunks: Some(vec!["Rust y sus traits".into()]),
            })),
        )
        .await
        .unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["summary"]["topics"][0]["title"], "Rust");

        let (status, Json(body)) = summarize_chunks_handler(
            State(test_state(RUST_TOPICS)),
            Ok(Json(SummarizePayload { chunks: None })),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn parse_pdf_rejects_bad_payloads() {
        let (_, Json(body)) = parse_pdf_handler(
            State(test_state(RUST_TOPICS)),
            Ok(Json(ParsePdfPayload {
                base64_pdf: Some("%%%".into()),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(body["status"], "error");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn mindmap_documents_lifecycle() {
        let state = test_state(RUST_TOPICS);

        let Json(created) = create_mindmap_handler(
            State(state.clone()),
            Ok(Json(create_payload("Notas sobre Rust\nOwnership y traits", "ana"))),
        )
        .await
        .unwrap();
        assert_eq!(created.title, "Notas sobre Rust");
        assert_eq!(created.user_id, "ana");
        assert_eq!(created.content.nodes.len(), 3);

        let Json(listed) = list_mindmaps_handler(
            State(state.clone()),
            Query(ListParams {
                user_id: Some("ana".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);

        let mut edited = serde_json::to_value(&created.content).unwrap();
        edited["nodes"][1]["position"] = json!({ "x": 10.5, "y": -3.0 });
        let Json(updated) = update_mindmap_handler(
            State(state.clone()),
            Path(created.id),
            Ok(Json(UpdateMindMapPayload {
                content: Some(edited),
                title: Some("Rust editado".into()),
            })),
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Rust editado");
        assert_eq!(updated.content.nodes[1].position.x, 10.5);

        let status = delete_mindmap_handler(State(state.clone()), Path(created.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = get_mindmap_handler(State(state), Path(created.id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dangling_edges_are_rejected_on_update() {
        let state = test_state(RUST_TOPICS);
        let Json(created) = create_mindmap_handler(
            State(state.clone()),
            Ok(Json(create_payload("Rust", "ana"))),
        )
        .await
        .unwrap();

        let mut broken = serde_json::to_value(&created.content).unwrap();
        broken["edges"][0]["target"] = json!("y");
        let (status, Json(body)) = update_mindmap_handler(
            State(state.clone()),
            Path(created.id),
            Ok(Json(UpdateMindMapPayload {
                content: Some(broken),
                title: None,
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("inexistente: y"));

        let stored = assert_ok!(state.store.get(created.id).await);
        assert_eq!(stored.content, created.content);
    }

    #[tokio::test]
    async fn process_pdf_accepts_multipart_uploads() {
        let state = test_state(RUST_TOPICS);
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"notas.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "Rust es un lenguaje de sistemas con ownership y traits.\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"userId\"\r\n\r\n",
            "ana\r\n",
            "--XBOUNDARY--\r\n",
        );
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/process-pdf")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let Json(response) = process_pdf_handler(State(state.clone()), request)
            .await
            .unwrap();
        assert_eq!(response["status"], "success");
        assert_eq!(response["data"]["title"], "notas");
        assert_eq!(response["data"]["user_id"], "ana");

        let saved = assert_ok!(state.store.list(Some("ana")).await);
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn process_pdf_rejects_non_http_urls() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/process-pdf")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"pdfUrl":"file:///etc/passwd"}"#))
            .unwrap();

        let (status, Json(body)) = process_pdf_handler(State(test_state(RUST_TOPICS)), request)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn voice_to_text_requires_audio() {
        let result = voice_to_text_handler(
            State(test_state(RUST_TOPICS)),
            Ok(Json(VoicePayload {
                audio: None,
                filename: None,
            })),
        )
        .await;
        assert_err!(result);
    }

    #[tokio::test]
    async fn health_reports_strategy_and_storage() {
        let Json(body) = health_handler(State(test_state(RUST_TOPICS))).await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["strategy"], "pipeline");
        assert_eq!(body["storage"], "memory");
    }
}
