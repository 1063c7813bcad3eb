//! Troceado de texto bajo un presupuesto de tokens estimados.
//!
//! La estimación es la heurística fija `ceil(caracteres / 4)`, no un
//! tokenizador real. Sólo se corta en fronteras de palabra.

use crate::error::{MindMapError, Result};
use crate::models::TextChunk;

/// Presupuesto por defecto de tokens por trozo.
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 2000;

/// Tokens estimados para un texto de `chars` caracteres.
pub fn estimate_tokens_for_len(chars: usize) -> usize {
    chars.div_ceil(4)
}

pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_for_len(text.chars().count())
}

/// Divide `text` en trozos ordenados de como mucho `max_tokens` tokens
/// estimados.
///
/// Si el texto completo cabe, se devuelve tal cual en un único trozo. Si no,
/// se acumulan palabras separadas por espacios hasta que la siguiente
/// rebasaría el límite. Una palabra que por sí sola excede el límite ocupa
/// un trozo propio (exceso aceptado).
pub fn chunk_text(text: &str, max_tokens: usize) -> Result<Vec<TextChunk>> {
    if max_tokens == 0 {
        return Err(MindMapError::input("el máximo de tokens por trozo debe ser > 0"));
    }
    if text.trim().is_empty() {
        return Err(MindMapError::input("No se proporcionó contenido"));
    }

    let total = estimate_tokens(text);
    if total <= max_tokens {
        return Ok(vec![TextChunk {
            index: 0,
            text: text.to_string(),
            estimated_tokens: total,
        }]);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let candidate = if current.is_empty() {
            word_chars
        } else {
            current_chars + 1 + word_chars
        };

        if !current.is_empty() && estimate_tokens_for_len(candidate) > max_tokens {
            push_chunk(&mut chunks, std::mem::take(&mut current), current_chars);
            current.push_str(word);
            current_chars = word_chars;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_chars = candidate;
        }
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, current, current_chars);
    }

    Ok(chunks)
}

fn push_chunk(chunks: &mut Vec<TextChunk>, text: String, chars: usize) {
    chunks.push(TextChunk {
        index: chunks.len(),
        text,
        estimated_tokens: estimate_tokens_for_len(chars),
    });
}
