//! Adaptadores de origen: convierten texto plano, PDF o audio en un
//! [`RawDocument`]. El pipeline sólo consume el texto resultante.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mime_guess::mime;
use tracing::{info, warn};
use url::Url;

use crate::error::{MindMapError, Result};
use crate::llm::LlmManager;
use crate::models::{RawDocument, SourceKind};

/// Clasifica un fichero subido por su tipo MIME declarado o, si no lo hay
/// (o es el genérico `application/octet-stream`), por la extensión.
pub fn detect_source(filename: Option<&str>, content_type: Option<&str>) -> SourceKind {
    let declared = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);
    let guessed = filename.and_then(|name| mime_guess::from_path(name).first());

    match declared.or(guessed) {
        Some(m) if m.type_() == mime::AUDIO || m.type_() == mime::VIDEO => SourceKind::Audio,
        Some(m) if m.subtype() == mime::PDF => SourceKind::Pdf,
        _ => SourceKind::Plain,
    }
}

/// Decodifica una carga útil en base64 (admite el prefijo `data:...;base64,`).
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let data = payload
        .split_once(";base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(payload)
        .trim();
    if data.is_empty() {
        return Err(MindMapError::input("contenido base64 vacío"));
    }
    STANDARD
        .decode(data)
        .map_err(|e| MindMapError::input(format!("base64 inválido: {e}")))
}

/// Colapsa los espacios dentro de cada párrafo y separa los párrafos con
/// una línea en blanco.
pub fn normalize_extracted_text(text: &str) -> String {
    text.split("\n\n")
        .map(|paragraph| paragraph.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extrae el texto de un PDF en memoria.
///
/// `pdf-extract` es síncrono y puede entrar en pánico con ficheros
/// corruptos, así que se ejecuta en un hilo bloqueante.
pub async fn pdf_from_bytes(bytes: Vec<u8>) -> Result<RawDocument> {
    if bytes.is_empty() {
        return Err(MindMapError::input("No se proporcionó contenido PDF"));
    }
    info!("Cargando documento PDF ({} bytes)...", bytes.len());

    let extracted = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| MindMapError::input(format!("Failed to parse PDF: {e}")))?
    .map_err(|e| MindMapError::input(format!("Failed to parse PDF: {e}")))?;

    let text = normalize_extracted_text(&extracted);
    if text.is_empty() {
        warn!("El PDF no contiene texto legible");
        return Err(MindMapError::input("No readable text found in PDF"));
    }

    Ok(RawDocument {
        text,
        source: SourceKind::Pdf,
    })
}

pub async fn pdf_from_base64(payload: &str) -> Result<RawDocument> {
    pdf_from_bytes(decode_base64(payload)?).await
}

/// Valida que la URL sea http(s).
pub fn parse_pdf_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| MindMapError::input(format!("URL de PDF inválida: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MindMapError::input(format!(
            "esquema de URL no soportado: {other}"
        ))),
    }
}

/// Último segmento de la ruta de la URL, útil como título por defecto.
pub fn title_from_url(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| name.trim_end_matches(".pdf").to_string())
}

/// Rechaza descargas que superan `max_bytes`.
pub fn check_download_size(len: usize, max_bytes: usize) -> Result<()> {
    if len > max_bytes {
        return Err(MindMapError::input(format!(
            "el PDF supera el tamaño máximo de {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Descarga un PDF remoto y extrae su texto. La descarga completa está
/// acotada por `timeout` y el cuerpo por `max_bytes`.
pub async fn pdf_from_url(raw_url: &str, max_bytes: usize, timeout: Duration) -> Result<RawDocument> {
    let url = parse_pdf_url(raw_url)?;
    info!("Descargando PDF desde {url}");

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let mut response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(MindMapError::upstream(format!(
            "no se pudo descargar {url}: HTTP {}",
            response.status()
        )));
    }
    if let Some(declared) = response.content_length() {
        check_download_size(usize::try_from(declared).unwrap_or(usize::MAX), max_bytes)?;
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        check_download_size(bytes.len() + chunk.len(), max_bytes)?;
        bytes.extend_from_slice(&chunk);
    }
    pdf_from_bytes(bytes).await
}

/// Transcribe una grabación de audio.
pub async fn audio_from_bytes(llm: &LlmManager, audio: Vec<u8>, filename: &str) -> Result<RawDocument> {
    if audio.is_empty() {
        return Err(MindMapError::input("No se proporcionó audio"));
    }
    info!("Transcribiendo audio '{}' ({} bytes)...", filename, audio.len());

    let text = llm.transcribe(audio, filename).await?;
    if text.trim().is_empty() {
        return Err(MindMapError::input("La transcripción no contiene texto"));
    }
    Ok(RawDocument {
        text,
        source: SourceKind::Audio,
    })
}

/// Texto plano subido como fichero.
pub fn plain_from_bytes(bytes: Vec<u8>) -> Result<RawDocument> {
    let text = String::from_utf8(bytes)
        .map_err(|_| MindMapError::input("el fichero no es texto UTF-8"))?;
    if text.trim().is_empty() {
        return Err(MindMapError::input("No se proporcionó contenido"));
    }
    Ok(RawDocument::plain(text))
}
