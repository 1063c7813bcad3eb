//! Taxonomía de errores del pipeline texto → mapa mental.
//!
//! Cada etapa falla la petición completa: no hay resultados parciales.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MindMapError>;

#[derive(Error, Debug)]
pub enum MindMapError {
    /// Falta contenido o el cliente envió un campo vacío.
    #[error("Entrada inválida: {0}")]
    Input(String),

    /// La llamada al modelo (o a otro servicio remoto) falló o no respondió.
    #[error("Error en la llamada al modelo: {0}")]
    UpstreamCall(String),

    /// La respuesta del modelo no es JSON o le faltan campos obligatorios.
    #[error("No se pudo interpretar la estructura: {0}")]
    StructureParse(String),

    /// JSON bien formado que no cumple forma o integridad referencial.
    #[error("Estructura de mapa mental inválida: {0}")]
    StructureValidation(String),

    #[error("Error de persistencia: {0}")]
    Persistence(String),

    #[error("No encontrado: {0}")]
    NotFound(String),
}

impl MindMapError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamCall(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::StructureParse(msg.into())
    }

    /// Agrupa todos los problemas detectados en un único error de validación.
    pub fn validation(issues: &[String]) -> Self {
        Self::StructureValidation(issues.join("; "))
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

impl From<neo4rs::Error> for MindMapError {
    fn from(err: neo4rs::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for MindMapError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamCall(err.to_string())
    }
}
