//! Advisor chat: retrieval-grounded Q&A sessions about tutela procedure.
//! Sessions live in memory; each answer carries its sources and a fixed
//! disclaimer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use tutela_core::ai::{Retriever, TextGenerator};
use tutela_core::error::{DomainError, Result};
use tutela_core::types::Passage;

pub const DISCLAIMER: &str =
    "Esto es apoyo informativo; no sustituye asesoría legal profesional.";

pub const GREETING: &str =
    "¡Hola! Soy tu asesor en acciones de tutela (Colombia). ¿Qué te preocupa?";

const DEFAULT_SYSTEM_HINT: &str = "Eres un asistente jurídico especializado en acciones de \
     tutela en Colombia. Responde de forma clara, breve y accionable. Incluye, cuando proceda, \
     inmediatez, subsidiariedad y legitimación por activa/pasiva. No inventes jurisprudencia ni \
     artículos; apóyate en el contexto proporcionado.";

const HISTORY_MAX_MESSAGES: usize = 12;
const HISTORY_MAX_CHARS: usize = 4000;
const CONTEXT_MAX_CHARS: usize = 8000;
const SNIPPET_MAX_CHARS: usize = 240;

#[derive(Debug, Clone)]
struct Turn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Default)]
struct Session {
    system_hint: Option<String>,
    turns: Vec<Turn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: Option<i64>,
    pub snippet: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorAnswer {
    pub answer: String,
    pub session_id: String,
    pub sources: Vec<SourceRef>,
}

pub struct Advisor {
    generator: Option<Arc<dyn TextGenerator>>,
    retriever: Option<Arc<dyn Retriever>>,
    top_k: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

fn take_last_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    s.chars().skip(count - max).collect()
}

fn take_first_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Crop a snippet to its budget, dropping a trailing partial line.
fn crop_snippet(text: &str) -> String {
    let s = take_first_chars(text.trim(), SNIPPET_MAX_CHARS);
    match s.rsplit_once('\n') {
        Some((head, _)) if !head.trim().is_empty() => head.trim().to_string(),
        _ => s.trim().to_string(),
    }
}

fn source_url(source: &str, page: Option<i64>) -> String {
    let path = format!("/docs/{}", urlencoding::encode(source));
    if source.to_lowercase().ends_with(".pdf") {
        if let Some(page) = page {
            return format!("{path}#page={page}");
        }
    }
    path
}

fn format_docs(passages: &[Passage]) -> String {
    let blocks: Vec<String> = passages
        .iter()
        .map(|p| {
            let source = if p.metadata.source.is_empty() {
                "desconocido"
            } else {
                &p.metadata.source
            };
            let header = match p.metadata.page {
                Some(page) => format!("[source: {source} | p.{page}]"),
                None => format!("[source: {source}]"),
            };
            format!("{header}\n{}", p.content.trim())
        })
        .collect();
    take_first_chars(&blocks.join("\n\n---\n\n"), CONTEXT_MAX_CHARS)
}

fn format_history(turns: &[Turn]) -> String {
    let start = turns.len().saturating_sub(HISTORY_MAX_MESSAGES);
    let lines: Vec<String> = turns[start..]
        .iter()
        .filter(|t| !t.content.trim().is_empty())
        .map(|t| {
            let tag = if t.role == "user" { "Usuario" } else { "Asesor" };
            format!("{tag}: {}", t.content.trim())
        })
        .collect();
    take_last_chars(&lines.join("\n"), HISTORY_MAX_CHARS)
}

fn build_prompt(question: &str, history: &str, context: &str, system_hint: Option<&str>) -> String {
    let system = system_hint.unwrap_or(DEFAULT_SYSTEM_HINT);
    format!(
        "{system}\n\n\
         === HISTORIAL ===\n{history}\n\n\
         === CONTEXTO (fragmentos recuperados) ===\n{context}\n\n\
         === PREGUNTA ===\n{question}\n\n\
         Indica pasos concretos sólo cuando aporten valor. Si falta base documental, dilo."
    )
}

impl Advisor {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        retriever: Option<Arc<dyn Retriever>>,
        top_k: usize,
    ) -> Self {
        Self {
            generator,
            retriever,
            top_k,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session and returns (session_id, greeting).
    pub fn start(&self, system_hint: Option<String>) -> (String, &'static str) {
        let sid = tutela_core::db::new_id();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            sid.clone(),
            Session {
                system_hint,
                turns: Vec::new(),
            },
        );
        (sid, GREETING)
    }

    pub async fn answer(&self, session_id: &str, message: &str) -> Result<AdvisorAnswer> {
        let (history, system_hint) = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let session = sessions.get(session_id).ok_or_else(|| {
                DomainError::BadRequest("session_id inválido o inexistente.".to_string())
            })?;
            (format_history(&session.turns), session.system_hint.clone())
        };

        let passages = match self.retriever.as_ref() {
            Some(r) => match r.retrieve(message, self.top_k).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "advisor retrieval failed, answering without context");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let context = format_docs(&passages);
        let prompt = build_prompt(message, &history, &context, system_hint.as_deref());

        let raw_answer = match self.generator.as_ref() {
            Some(g) => match g.generate(&prompt).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(error = %e, "advisor generation failed");
                    "No fue posible generar una respuesta en este momento; intenta de nuevo."
                        .to_string()
                }
            },
            None => {
                "El asesor no tiene un modelo configurado; revisa la norma pertinente en las \
                 fuentes listadas."
                    .to_string()
            }
        };

        let sources: Vec<SourceRef> = passages
            .iter()
            .map(|p| {
                let source = if p.metadata.source.is_empty() {
                    "desconocido".to_string()
                } else {
                    p.metadata.source.clone()
                };
                let snippet = crop_snippet(&p.content);
                let url = source_url(&source, p.metadata.page);
                SourceRef {
                    source,
                    page: p.metadata.page,
                    snippet,
                    url,
                }
            })
            .collect();

        let sources_text = if sources.is_empty() {
            "- (sin fuentes en el índice)".to_string()
        } else {
            sources
                .iter()
                .map(|s| match s.page {
                    Some(page) => format!("- {} (p. {page})", s.source),
                    None => format!("- {}", s.source),
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let final_answer = format!("{raw_answer}\n\nFuentes:\n{sources_text}\n\n{DISCLAIMER}")
            .trim()
            .to_string();

        {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(session) = sessions.get_mut(session_id) {
                session.turns.push(Turn {
                    role: "user",
                    content: message.to_string(),
                });
                session.turns.push(Turn {
                    role: "assistant",
                    content: final_answer.clone(),
                });
            }
        }

        Ok(AdvisorAnswer {
            answer: final_answer,
            session_id: session_id.to_string(),
            sources,
        })
    }
}
