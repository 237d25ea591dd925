use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Parties ───────────────────────────────────────────────────────────────

/// Procedural role of a party in the tutela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRole {
    #[serde(rename = "accionante")]
    Accionante,
    #[serde(rename = "accionado")]
    Accionado,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Accionante => "accionante",
            PartyRole::Accionado => "accionado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accionante" => Some(PartyRole::Accionante),
            "accionado" => Some(PartyRole::Accionado),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub id: String,
    pub case_id: String,
    pub role: PartyRole,
    pub nombres: String,
    pub apellidos: String,
    pub tipo_id: String,
    pub numero_id: String,
    pub email: String,
    pub telefono: String,
    pub direccion: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Party {
    /// "Nombres Apellidos", trimmed; empty if neither is set.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.nombres.trim(), self.apellidos.trim())
            .trim()
            .to_string()
    }

    /// "TIPO NUMERO", trimmed; empty if neither is set.
    pub fn display_ident(&self) -> String {
        format!("{} {}", self.tipo_id.trim(), self.numero_id.trim())
            .trim()
            .to_string()
    }

    /// "Nombre Apellido — TIPO NUMERO", or just the name when no id.
    pub fn inline_label(&self) -> String {
        let name = self.display_name();
        let ident = self.display_ident();
        if !name.is_empty() && !ident.is_empty() {
            format!("{name} — {ident}")
        } else {
            name
        }
    }
}

/// Fields accepted by the party upsert. `id` present → update, absent → insert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyUpsert {
    pub id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
    #[serde(default)]
    pub tipo_id: String,
    #[serde(default)]
    pub numero_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub direccion: String,
}

// ── Sections ──────────────────────────────────────────────────────────────

/// Lifecycle state of a section: empty → draft → ai_suggested → approved,
/// with a forced re-entry to draft on invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionStatus {
    #[default]
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "ai_suggested")]
    AiSuggested,
    #[serde(rename = "approved")]
    Approved,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::Empty => "empty",
            SectionStatus::Draft => "draft",
            SectionStatus::AiSuggested => "ai_suggested",
            SectionStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "draft" => SectionStatus::Draft,
            "ai_suggested" => SectionStatus::AiSuggested,
            "approved" => SectionStatus::Approved,
            _ => SectionStatus::Empty,
        }
    }
}

/// Provenance entry for a retrieval-backed section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub id: i64,
    pub case_id: String,
    pub name: String,
    pub user_text: String,
    pub ai_text: String,
    pub final_text: String,
    pub needs_llm: bool,
    pub send_order: Option<i64>,
    pub status: SectionStatus,
    pub citations: Vec<Citation>,
    pub updated_at: DateTime<Utc>,
}

impl Section {
    /// Effective text: final > ai > user > "". Every downstream consumer
    /// (gate, chain, composer, export) uses this exact precedence.
    pub fn resolved_text(&self) -> &str {
        for t in [&self.final_text, &self.ai_text, &self.user_text] {
            if !t.trim().is_empty() {
                return t.trim();
            }
        }
        ""
    }
}

// ── Retrieval ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One retrieved passage from the document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    /// Title for prompts and citations: title > source > "doc".
    pub fn label(&self) -> &str {
        if let Some(t) = self.metadata.title.as_deref() {
            if !t.is_empty() {
                return t;
            }
        }
        if !self.metadata.source.is_empty() {
            return &self.metadata.source;
        }
        "doc"
    }
}

// ── Rights ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RightDetected {
    pub id: i64,
    pub case_id: String,
    pub right_name: String,
    pub argument_ai: String,
    pub sources: Vec<Citation>,
    pub updated_at: DateTime<Utc>,
}

// ── Cases ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Case {
    pub id: String,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub case_id: String,
    pub title: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Everything a front-end needs to render a case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseBundle {
    pub case: Case,
    pub parties: Vec<Party>,
    pub sections: Vec<Section>,
    pub rights_detected: Vec<RightDetected>,
}

// ── Chain output ──────────────────────────────────────────────────────────

/// Texts produced by one end-to-end run of the legal-reasoning chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutput {
    pub derechos_vulnerados: String,
    pub fundamentos_juridicos: String,
    pub fundamentos_de_derecho: String,
    #[serde(rename = "ref")]
    pub ref_line: String,
}
