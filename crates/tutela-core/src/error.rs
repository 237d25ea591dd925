use thiserror::Error;

/// Domain error taxonomy. Messages are user-facing and in Spanish, the
/// language of the documents the service produces.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Caso no encontrado")]
    CaseNotFound(String),

    #[error("Sección desconocida: {0}")]
    UnknownSection(String),

    #[error("Sección no existe para este caso: {0}")]
    SectionNotFound(String),

    #[error("Persona no encontrada en el caso")]
    PartyNotFound(String),

    /// A prerequisite of an explicit improve action has no resolved text yet.
    #[error("Faltan secciones previas para {section}: {}", missing.join(", "))]
    MissingDependencies {
        section: String,
        missing: Vec<String>,
    },

    #[error("Esta sección no requiere LLM")]
    NotLlmEligible(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    /// Another chain/pipeline run is already in flight for the case.
    #[error("Ya hay una generación en curso para este caso")]
    CaseBusy(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    /// Stable machine-readable kind for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::CaseNotFound(_)
            | DomainError::UnknownSection(_)
            | DomainError::SectionNotFound(_)
            | DomainError::PartyNotFound(_) => "not_found",
            DomainError::MissingDependencies { .. } | DomainError::CaseBusy(_) => "conflict",
            DomainError::NotLlmEligible(_) | DomainError::BadRequest(_) => "bad_request",
            DomainError::Validation(_) => "validation",
            DomainError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
