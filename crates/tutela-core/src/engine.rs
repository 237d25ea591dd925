//! Improvement engine: prompt routing per section, the four-part legal
//! grounds sub-pipeline, the retrieval-backed statutory citations, the
//! chain auto-generator and the save/approve orchestration around them.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::ai::{Retriever, TextGenerator};
use crate::catalog::{self, section_meta};
use crate::db::Db;
use crate::error::{DomainError, Result};
use crate::lexicon;
use crate::parties;
use crate::types::{ChainOutput, Citation, Section};

// ── Section guides (prompt fragments) ─────────────────────────────────────

const GUIDE_HECHOS: &str = "Redacta HECHOS en español claro, en orden cronológico, conciso y \
     verificable. Devuelve una lista numerada (1), (2), (3)... sin encabezados ni preámbulos. \
     Prohibido: frases sobre 'análisis', 'según lo anterior' o hablar de ti.";

const GUIDE_DERECHOS: &str = "Redacta DERECHOS VULNERADOS conectados con los hechos. Primero \
     nómbralos y luego explica brevemente el porqué. Usa viñetas o numeración; sin preámbulos ni \
     metadiscurso. Cuando citemos normas o jurisprudencia, si usas texto literal ponlo entre comillas.";

const GUIDE_PRETENSIONES: &str = "Organiza PRETENSIONES en lista numerada con órdenes claras y \
     plazos razonables. Puedes sugerir complementarias. Sin metadiscurso. No pongas pretensiones \
     economicas o relacionadas al dinero";

const GUIDE_PRUEBAS: &str = "Limpia y ordena PRUEBAS Y ANEXOS en lista numerada. Sin preámbulos. \
     No inventes documentos, solo mejora la redaccion de los documentos presentados por el usuario";

const GUIDE_FUND_DERECHO: &str = "Devuelve SOLO una lista numerada de normas y sentencias \
     aplicables, sin explicar. Usa un formato de cita breve y estandarizado, por ejemplo: \
     1) 'C.P., art. 86'; 2) 'D. 2591 de 1991, arts. 5, 6 y 42'; 3) 'Ley 1751 de 2015, art. 2'; \
     4) 'CC, T-###/AAAA'; 5) 'CC, SU-###/AAAA'. Incluye únicamente disposiciones pertinentes al \
     caso; no inventes números ni años. No agregues comentarios, glosas ni textos introductorios.";

const GUIDE_REF: &str = "Devuelve una sola línea de REFERENCIA precisa, sin preámbulos, con este \
     formato: 'Acción de tutela para la protección de los derechos fundamentales a [derechos] \
     (con conexidad con [otros, si aplica]), interpuesta por [NOMBRES ACCIONANTES] contra \
     [NOMBRES ACCIONADOS].' Usa exactamente los nombres que te paso en 'Accionantes' y \
     'Accionados'; NO uses corchetes ni marcadores. Termina en punto.";

const GUIDE_GENERIC: &str = "Mejora la redacción sin inventar.";

fn guide(name: &str) -> &'static str {
    match name {
        catalog::HECHOS => GUIDE_HECHOS,
        catalog::DERECHOS_VULNERADOS => GUIDE_DERECHOS,
        catalog::PRETENSIONES => GUIDE_PRETENSIONES,
        catalog::PRUEBAS_Y_ANEXOS => GUIDE_PRUEBAS,
        catalog::FUNDAMENTOS_DE_DERECHO => GUIDE_FUND_DERECHO,
        catalog::REF => GUIDE_REF,
        _ => GUIDE_GENERIC,
    }
}

const SUGGEST_PRETENSIONES_PROMPT: &str = "Con base en los HECHOS (depurados) y las pretensiones \
     del usuario ya redactadas, sugiere 3–5 pretensiones adicionales legítimas, razonables y NO \
     económicas. Devuelve SOLO una lista numerada corta, sin preámbulos.";

// ── Economic-claims filter ────────────────────────────────────────────────

static ECON_RE: LazyLock<Regex> = LazyLock::new(|| {
    let patterns = [
        r"\$",
        r"\bCOP\b",
        r"\bUSD\b",
        r"\beuros?\b",
        r"\bpesos?\b",
        r"\bmillones?\b",
        r"\bmonto\b",
        r"\bcuant[ií]a\b",
        r"\bindemnizaci[oó]n\b",
        r"\bpagos?\b",
        r"\bpagar\b",
        r"\bremuneraci[oó]n\b",
        r"\bcompensaci[oó]n\b",
        r"\blucro\b",
        r"\bda[ñn]os?\b\s*(material|inmaterial|moral)",
        r"\binter[eé]s(es)?\b",
    ];
    Regex::new(&format!("(?i){}", patterns.join("|"))).unwrap_or_else(|_| unreachable!())
});

/// True when the text names money and the filter is enforced. Matching is
/// advisory by default: the guard ships disabled because legitimate claims
/// routinely mention salary arrears or service invoices.
pub fn contains_economic_claim(text: &str, enforce: bool) -> bool {
    enforce && ECON_RE.is_match(text)
}

// ── Context ───────────────────────────────────────────────────────────────

/// Snapshot of case texts handed to the prompts. Fields hold resolved text
/// (final > ai > user).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionContext {
    pub hechos: String,
    pub derechos_vulnerados: String,
    pub fundamentos_juridicos: String,
    pub fundamentos_de_derecho: String,
    pub pruebas: String,
    pub personas: String,
    pub accionantes_inline: String,
    pub accionados_inline: String,
    pub derechos_detectados: Vec<String>,
}

impl SectionContext {
    fn detected_line(&self) -> String {
        let list = if self.derechos_detectados.is_empty() {
            "(ninguno)".to_string()
        } else {
            self.derechos_detectados.join(", ")
        };
        format!("Derechos detectados (diccionario): {list}")
    }
}

pub fn build_context(db: &Db, case_id: &str) -> Result<SectionContext> {
    let hechos = db.resolved_text(case_id, catalog::HECHOS)?;
    let derechos_vulnerados = db.resolved_text(case_id, catalog::DERECHOS_VULNERADOS)?;
    let fundamentos_juridicos = db.resolved_text(case_id, catalog::FUNDAMENTOS_JURIDICOS)?;
    let fundamentos_de_derecho = db.resolved_text(case_id, catalog::FUNDAMENTOS_DE_DERECHO)?;
    let pruebas = db.resolved_text(case_id, catalog::PRUEBAS_Y_ANEXOS)?;

    let accionantes = db.list_parties(case_id, Some(crate::types::PartyRole::Accionante))?;
    let accionados = db.list_parties(case_id, Some(crate::types::PartyRole::Accionado))?;
    let acc = parties::compose_people_inline(&accionantes);
    let ads = parties::compose_people_inline(&accionados);
    let personas = format!(
        "Accionante(s): {}\nAccionado(s): {}",
        if acc.is_empty() { "-" } else { &acc },
        if ads.is_empty() { "-" } else { &ads },
    );

    let derechos_detectados = lexicon::detect_rights(&format!("{hechos} {pruebas}"));

    Ok(SectionContext {
        hechos,
        derechos_vulnerados,
        fundamentos_juridicos,
        fundamentos_de_derecho,
        pruebas,
        personas,
        accionantes_inline: acc,
        accionados_inline: ads,
        derechos_detectados,
    })
}

// ── Engine ────────────────────────────────────────────────────────────────

pub struct Engine {
    generator: Option<Arc<dyn TextGenerator>>,
    retriever: Option<Arc<dyn Retriever>>,
    top_k: usize,
    enforce_econ_filter: bool,
}

impl Engine {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        retriever: Option<Arc<dyn Retriever>>,
        top_k: usize,
        enforce_econ_filter: bool,
    ) -> Self {
        Self {
            generator,
            retriever,
            top_k,
            enforce_econ_filter,
        }
    }

    pub fn enforces_econ_filter(&self) -> bool {
        self.enforce_econ_filter
    }

    /// One generation call that degrades to None on failure instead of
    /// aborting the surrounding multi-step flow.
    async fn try_generate(&self, prompt: &str) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator.generate(prompt).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "text generation failed, continuing without it");
                None
            }
        }
    }

    /// Retrieval for the statutory-citations prompt. Snippets are capped at
    /// 600 chars; failures degrade to an empty context.
    async fn docs_for_prompt(&self, query: &str) -> (Vec<String>, Vec<Citation>) {
        let Some(retriever) = self.retriever.as_ref() else {
            return (Vec::new(), Vec::new());
        };
        let passages = match retriever.retrieve(query, self.top_k).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without documents");
                Vec::new()
            }
        };
        let mut chunks = Vec::new();
        let mut citations = Vec::new();
        for p in passages.iter().take(self.top_k) {
            let content = p.content.trim();
            if content.is_empty() {
                continue;
            }
            let snippet: String = content.chars().take(600).collect();
            let title = p.label().to_string();
            chunks.push(format!("- {title}: {snippet}"));
            citations.push(Citation {
                title,
                snippet,
                metadata: serde_json::to_value(&p.metadata).unwrap_or_default(),
            });
        }
        (chunks, citations)
    }

    /// Legal grounds in four tolerant sub-calls. A failed sub-call leaves
    /// its slot blank; the fixed headings always come out in order.
    async fn legal_grounds(&self, ctx: &SectionContext) -> String {
        if self.generator.is_none() {
            return "1) Procedencia: analiza subsidiariedad, inmediatez, legitimación y perjuicio irremediable.\n\n\
                    2) Problema jurídico: formula una pregunta clara según los hechos.\n\n\
                    3) Reglas: enuncia reglas jurisprudenciales y legales pertinentes de forma sintética.\n\n\
                    4) Caso concreto: subsume los hechos a las reglas y explica la vulneración."
                .to_string();
        }

        let h = &ctx.hechos;
        let d = if ctx.derechos_vulnerados.trim().is_empty() {
            ctx.derechos_detectados.join("\n")
        } else {
            ctx.derechos_vulnerados.clone()
        };
        let p = &ctx.pruebas;

        let procedencia_prompt = format!(
            "Redacta el apartado 'Procedencia' de una acción de tutela (Colombia) en 1–3 párrafos, \
             analizando subsidiariedad, inmediatez, legitimación por activa/pasiva y perjuicio \
             irremediable. Ancla a hechos (H#) si corresponde. Sin metadiscurso.\n\n\
             Hechos (H#):\n{h}\n\nDerechos (D#):\n{d}\n\nPruebas (P#):\n{p}"
        );
        let problema_prompt = format!(
            "Formula el 'Problema jurídico' como UNA pregunta clara y completa, en una sola línea, \
             derivada de los hechos y los derechos invocados. Sin explicaciones.\n\n\
             Hechos (H#):\n{h}\n\nDerechos (D#):\n{d}"
        );
        let reglas_prompt = format!(
            "Enuncia 'Reglas jurisprudenciales y legales' en 3–6 ítems breves (sin citas extensas). \
             Cada ítem: regla clara aplicable al caso (enunciado general). Sin inventar \
             números/fechas.\n\nHechos (H#):\n{h}\n\nDerechos (D#):\n{d}"
        );
        let caso_prompt = format!(
            "Redacta 'Caso concreto' en 2–4 párrafos breves: subsume hechos a reglas, explica por \
             qué se configura (o no) la vulneración. Referencia (H#) o (P#) cuando proceda. Sin \
             frases de cierre grandilocuentes.\n\n\
             Hechos (H#):\n{h}\n\nDerechos (D#):\n{d}\n\nPruebas (P#):\n{p}"
        );

        let procedencia = self.try_generate(&procedencia_prompt).await.unwrap_or_default();
        let problema = self.try_generate(&problema_prompt).await.unwrap_or_default();
        let reglas = self.try_generate(&reglas_prompt).await.unwrap_or_default();
        let caso = self.try_generate(&caso_prompt).await.unwrap_or_default();

        format!(
            "1) Procedencia:\n{procedencia}\n\n\
             2) Problema jurídico:\n{problema}\n\n\
             3) Reglas jurisprudenciales y legales:\n{reglas}\n\n\
             4) Caso concreto:\n{caso}"
        )
        .trim()
        .to_string()
    }

    fn offline_fallback(&self, name: &str, user_text: &str, ctx: &SectionContext) -> String {
        let base = user_text.trim();
        if !base.is_empty() {
            return base.to_string();
        }
        match name {
            catalog::DERECHOS_VULNERADOS => {
                let det = &ctx.derechos_detectados;
                let prefix = if det.is_empty() {
                    String::new()
                } else {
                    format!("Derechos detectados: {}\n\n", det.join(", "))
                };
                format!("{prefix}{}", ctx.hechos)
            }
            catalog::FUNDAMENTOS_DE_DERECHO => {
                "1) C.P., art. 86\n2) D. 2591 de 1991, arts. 5, 6 y 42".to_string()
            }
            catalog::PRUEBAS_Y_ANEXOS => {
                "Normaliza el listado de pruebas/anexos (uno por línea).".to_string()
            }
            catalog::PRETENSIONES => {
                "Organiza pretensiones en lista numerada clara y ejecutable (sin economía).".to_string()
            }
            _ => String::new(),
        }
    }

    /// Section-routed improvement. Returns (ai_text, citations); citations
    /// are only ever non-empty for the retrieval-backed statutory section.
    pub async fn improve(
        &self,
        name: &str,
        user_text: &str,
        ctx: &SectionContext,
    ) -> (String, Vec<Citation>) {
        if name == catalog::FUNDAMENTOS_JURIDICOS {
            return (self.legal_grounds(ctx).await, Vec::new());
        }
        if self.generator.is_none() {
            return (self.offline_fallback(name, user_text, ctx), Vec::new());
        }

        let (rag_chunks, citations) = if name == catalog::FUNDAMENTOS_DE_DERECHO {
            let query = if ctx.fundamentos_juridicos.trim().is_empty() {
                ctx.hechos.clone()
            } else {
                ctx.fundamentos_juridicos.clone()
            };
            self.docs_for_prompt(&query).await
        } else {
            (Vec::new(), Vec::new())
        };

        let mut parts: Vec<String> =
            vec!["Eres un redactor jurídico colombiano especializado en acciones de tutela.".to_string()];

        match name {
            catalog::DERECHOS_VULNERADOS => {
                parts.push(guide(name).to_string());
                parts.push(format!("Hechos (H#):\n{}", ctx.hechos));
                parts.push(ctx.detected_line());
            }
            catalog::FUNDAMENTOS_DE_DERECHO => {
                parts.push(guide(name).to_string());
                let base = if rag_chunks.is_empty() {
                    "-".to_string()
                } else {
                    rag_chunks.join("\n")
                };
                parts.push(format!(
                    "Base EXCLUSIVA para citar (no inventes, usa lo siguiente):\n{base}"
                ));
                parts.push(
                    "ENTREGA SOLO una lista numerada de normas/sentencias reales, formateadas como \
                     en la guía. Sin comentarios."
                        .to_string(),
                );
            }
            catalog::REF => {
                parts.push(guide(name).to_string());
                parts.push(format!(
                    "Derechos:\n{}\n\nFundamentos Jurídicos:\n{}\n\nFundamentos de Derecho:\n{}\n\n\
                     Partes (úsalas tal cual, sin corchetes):\n\
                     Accionantes: {}\nAccionados: {}",
                    ctx.derechos_vulnerados,
                    ctx.fundamentos_juridicos,
                    ctx.fundamentos_de_derecho,
                    if ctx.accionantes_inline.is_empty() { "(sin registrar)" } else { &ctx.accionantes_inline },
                    if ctx.accionados_inline.is_empty() { "(sin registrar)" } else { &ctx.accionados_inline },
                ));
            }
            _ => {
                parts.push(guide(name).to_string());
                let ctx_json = serde_json::to_string(ctx).unwrap_or_default();
                let truncated: String = ctx_json.chars().take(1500).collect();
                parts.push(format!("Contexto:\n{truncated}"));
            }
        }

        parts.push("ENTREGA SOLO EL CONTENIDO SOLICITADO, sin introducciones.".to_string());
        if !user_text.trim().is_empty() {
            parts.push(format!(
                "Texto del usuario (si aplica):\n\"\"\"\n{}\n\"\"\"",
                user_text.trim()
            ));
        }

        match self.try_generate(&parts.join("\n\n")).await {
            Some(text) if !text.is_empty() => (text, citations),
            // Degrade to the best text already in hand.
            _ => {
                let base = if user_text.trim().is_empty() {
                    ctx.hechos.trim().to_string()
                } else {
                    user_text.trim().to_string()
                };
                (base, Vec::new())
            }
        }
    }

    /// Improve a section and persist the AI result. Pretensiones AI text is
    /// held to the same economic-claims rule as user edits.
    pub async fn improve_store(&self, db: &Db, case_id: &str, name: &str) -> Result<Section> {
        let section = db.get_section(case_id, name)?;
        let ctx = build_context(db, case_id)?;
        let (ai_text, citations) = self.improve(name, &section.user_text, &ctx).await;
        if name == catalog::PRETENSIONES
            && contains_economic_claim(&ai_text, self.enforce_econ_filter)
        {
            return Err(DomainError::Validation(
                "Las pretensiones no pueden incluir peticiones económicas".to_string(),
            ));
        }
        db.save_ai_text(case_id, name, &ai_text, &citations)
    }

    /// Dependency gate for explicit improve/ensure calls: each prerequisite
    /// must already have resolved text.
    pub fn check_dependencies(&self, db: &Db, case_id: &str, name: &str) -> Result<()> {
        let missing: Vec<String> = catalog::prerequisites(name)
            .iter()
            .filter_map(|dep| match db.resolved_text(case_id, dep) {
                Ok(txt) if txt.trim().is_empty() => Some(Ok(dep.to_string())),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<anyhow::Result<_>>()?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DomainError::MissingDependencies {
                section: name.to_string(),
                missing,
            })
        }
    }

    /// Explicit improve entry point (improve/ensure endpoints): validates
    /// LLM eligibility and prerequisites, then improves, then refreshes the
    /// detected-rights panel when derechos_vulnerados changed.
    pub async fn improve_section(&self, db: &Db, case_id: &str, name: &str) -> Result<Section> {
        db.get_case(case_id)?;
        let meta =
            section_meta(name).ok_or_else(|| DomainError::UnknownSection(name.to_string()))?;
        if !meta.needs_llm {
            return Err(DomainError::NotLlmEligible(name.to_string()));
        }
        self.check_dependencies(db, case_id, name)?;
        let updated = self.improve_store(db, case_id, name).await?;

        if name == catalog::DERECHOS_VULNERADOS {
            let text = if updated.ai_text.trim().is_empty() {
                &updated.user_text
            } else {
                &updated.ai_text
            };
            for right in lexicon::detect_rights(text) {
                db.upsert_right(case_id, &right, "", &[])?;
            }
        }
        Ok(updated)
    }

    async fn suggest_pretensiones(&self, db: &Db, case_id: &str) -> Result<String> {
        if self.generator.is_none() {
            return Ok(String::new());
        }
        let hechos = db.resolved_text(case_id, catalog::HECHOS)?;
        let pret = db.resolved_text(case_id, catalog::PRETENSIONES)?;
        let prompt = format!(
            "{SUGGEST_PRETENSIONES_PROMPT}\n\nHECHOS:\n{hechos}\n\nPRETENSIONES (usuario/limpiadas):\n{pret}\n"
        );
        Ok(self.try_generate(&prompt).await.unwrap_or_default())
    }

    /// Improve pretensiones and append suggested extra claims under a fixed
    /// marker heading.
    async fn improve_pretensiones(&self, db: &Db, case_id: &str) -> Result<()> {
        self.improve_store(db, case_id, catalog::PRETENSIONES).await?;
        let extra = self.suggest_pretensiones(db, case_id).await?;
        if !extra.trim().is_empty() {
            let prev = db.get_section(case_id, catalog::PRETENSIONES)?;
            let base = if prev.ai_text.trim().is_empty() {
                prev.user_text.trim()
            } else {
                prev.ai_text.trim()
            };
            let combined = format!("{base}\n\nPretensiones sugeridas:\n{}", extra.trim())
                .trim()
                .to_string();
            if contains_economic_claim(&combined, self.enforce_econ_filter) {
                return Err(DomainError::Validation(
                    "Las pretensiones no pueden incluir peticiones económicas".to_string(),
                ));
            }
            db.save_ai_text(case_id, catalog::PRETENSIONES, &combined, &[])?;
        }
        Ok(())
    }

    /// Save a user edit and run the declarative side effects: intro
    /// placeholder substitution, auto-improvement for the sections that get
    /// it, and the invalidation cascade.
    pub async fn save_section(
        &self,
        db: &Db,
        case_id: &str,
        name: &str,
        user_text: &str,
    ) -> Result<Section> {
        db.get_case(case_id)?;
        if section_meta(name).is_none() {
            return Err(DomainError::UnknownSection(name.to_string()));
        }

        let mut text = user_text.to_string();
        if name == catalog::INTRO && !text.trim().is_empty() {
            let accionados =
                db.list_parties(case_id, Some(crate::types::PartyRole::Accionado))?;
            let ads = parties::compose_people_inline(&accionados);
            if !ads.is_empty() {
                text = parties::substitute_intro_placeholders(&text, &ads);
            }
        }

        if name == catalog::PRETENSIONES
            && contains_economic_claim(&text, self.enforce_econ_filter)
        {
            return Err(DomainError::Validation(
                "Las pretensiones no pueden incluir peticiones económicas".to_string(),
            ));
        }

        let saved = db.save_user_text(case_id, name, &text)?;

        match name {
            catalog::HECHOS => {
                self.improve_store(db, case_id, catalog::HECHOS).await?;
                db.invalidate_sections(case_id, catalog::invalidated_by(catalog::HECHOS))?;
            }
            catalog::PRETENSIONES => {
                // Improves but never invalidates: rights derive from facts only.
                self.improve_pretensiones(db, case_id).await?;
            }
            catalog::PRUEBAS_Y_ANEXOS => {
                self.improve_store(db, case_id, catalog::PRUEBAS_Y_ANEXOS).await?;
                db.invalidate_sections(case_id, catalog::invalidated_by(catalog::PRUEBAS_Y_ANEXOS))?;
            }
            _ => {}
        }

        db.touch_case(case_id)?;
        if catalog::AUTO_IMPROVE_ON_SAVE.contains(&name) {
            db.get_section(case_id, name)
        } else {
            Ok(saved)
        }
    }

    /// Approve a section, guarding pretensiones against economic claims.
    pub fn approve(
        &self,
        db: &Db,
        case_id: &str,
        name: &str,
        from_ai: bool,
    ) -> Result<Section> {
        db.get_case(case_id)?;
        if name == catalog::PRETENSIONES {
            let current = db.get_section(case_id, name)?;
            let candidate = if from_ai {
                &current.ai_text
            } else {
                &current.user_text
            };
            if contains_economic_claim(candidate, self.enforce_econ_filter) {
                return Err(DomainError::Validation(
                    "Las pretensiones no pueden incluir peticiones económicas".to_string(),
                ));
            }
        }
        db.approve_section(case_id, name, from_ai)
    }

    /// Chain auto-generation: derechos → fundamentos jurídicos →
    /// fundamentos de derecho → ref, each persisted as it is produced so a
    /// late failure keeps the earlier stages.
    pub async fn chain(&self, db: &Db, case_id: &str) -> Result<ChainOutput> {
        db.get_case(case_id)?;
        let hechos = db.resolved_text(case_id, catalog::HECHOS)?;
        let pruebas = db.resolved_text(case_id, catalog::PRUEBAS_Y_ANEXOS)?;
        if hechos.trim().is_empty() {
            return Err(DomainError::Validation(
                "Faltan HECHOS (mejorados) para encadenar.".to_string(),
            ));
        }

        let derechos_detectados = lexicon::detect_rights(&format!("{hechos} {pruebas}"));

        // 1) Derechos, from facts plus the lexicon hits.
        let ctx_d = SectionContext {
            hechos: hechos.clone(),
            derechos_detectados: derechos_detectados.clone(),
            ..Default::default()
        };
        let (ai_d, _) = self.improve(catalog::DERECHOS_VULNERADOS, "", &ctx_d).await;
        db.save_ai_text(case_id, catalog::DERECHOS_VULNERADOS, &ai_d, &[])?;

        // 2) Legal grounds over the full fact/rights/evidence context.
        let ctx_fj = SectionContext {
            hechos: hechos.clone(),
            derechos_vulnerados: ai_d.clone(),
            pruebas: pruebas.clone(),
            derechos_detectados: derechos_detectados.clone(),
            ..Default::default()
        };
        let (ai_fj, _) = self.improve(catalog::FUNDAMENTOS_JURIDICOS, "", &ctx_fj).await;
        db.save_ai_text(case_id, catalog::FUNDAMENTOS_JURIDICOS, &ai_fj, &[])?;

        // 3) Statutory citations via retrieval, queried with the grounds.
        let ctx_fd = SectionContext {
            hechos: hechos.clone(),
            fundamentos_juridicos: ai_fj.clone(),
            ..Default::default()
        };
        let (ai_fd, cites_fd) = self.improve(catalog::FUNDAMENTOS_DE_DERECHO, "", &ctx_fd).await;
        db.save_ai_text(case_id, catalog::FUNDAMENTOS_DE_DERECHO, &ai_fd, &cites_fd)?;

        // 4) Reference line synthesizing the three, with real party names.
        let accionantes = db.list_parties(case_id, Some(crate::types::PartyRole::Accionante))?;
        let accionados = db.list_parties(case_id, Some(crate::types::PartyRole::Accionado))?;
        let ctx_ref = SectionContext {
            derechos_vulnerados: ai_d.clone(),
            fundamentos_juridicos: ai_fj.clone(),
            fundamentos_de_derecho: ai_fd.clone(),
            accionantes_inline: parties::compose_people_inline(&accionantes),
            accionados_inline: parties::compose_people_inline(&accionados),
            ..Default::default()
        };
        let (ai_ref, _) = self.improve(catalog::REF, "", &ctx_ref).await;
        db.save_ai_text(case_id, catalog::REF, &ai_ref, &[])?;

        for right in &derechos_detectados {
            db.upsert_right(case_id, right, "", &[])?;
        }
        db.touch_case(case_id)?;

        Ok(ChainOutput {
            derechos_vulnerados: ai_d,
            fundamentos_juridicos: ai_fj,
            fundamentos_de_derecho: ai_fd,
            ref_line: ai_ref,
        })
    }

    /// Full pipeline: facts, optional pretensiones, then the chain. Returns
    /// the list of sections that ran.
    pub async fn run_pipeline(&self, db: &Db, case_id: &str) -> Result<Vec<String>> {
        db.get_case(case_id)?;
        let mut ran = Vec::new();

        self.improve_store(db, case_id, catalog::HECHOS).await?;
        ran.push(catalog::HECHOS.to_string());

        let pret = db.get_section(case_id, catalog::PRETENSIONES)?;
        if !pret.user_text.trim().is_empty() {
            self.improve_pretensiones(db, case_id).await?;
            ran.push(catalog::PRETENSIONES.to_string());
        }

        self.chain(db, case_id).await?;
        ran.extend(
            [
                catalog::DERECHOS_VULNERADOS,
                catalog::FUNDAMENTOS_JURIDICOS,
                catalog::FUNDAMENTOS_DE_DERECHO,
                catalog::REF,
            ]
            .map(String::from),
        );
        Ok(ran)
    }

    /// Re-scan facts and the rights section, persisting every lexicon hit.
    pub fn detect_and_store_rights(&self, db: &Db, case_id: &str) -> Result<Vec<String>> {
        db.get_case(case_id)?;
        let hechos = db.resolved_text(case_id, catalog::HECHOS)?;
        let derechos = db.resolved_text(case_id, catalog::DERECHOS_VULNERADOS)?;
        let rights = lexicon::detect_rights(&format!("{hechos} {derechos}"));
        for right in &rights {
            db.upsert_right(case_id, right, "", &[])?;
        }
        Ok(rights)
    }

    /// Draft an argument for one specific right and persist it on the
    /// rights panel entry.
    pub async fn argue_right(
        &self,
        db: &Db,
        case_id: &str,
        right_name: &str,
    ) -> Result<crate::types::RightDetected> {
        db.get_case(case_id)?;
        let hechos = db.resolved_text(case_id, catalog::HECHOS)?;
        let derechos = db.resolved_text(case_id, catalog::DERECHOS_VULNERADOS)?;
        let user_text = format!(
            "Hechos:\n{hechos}\n\nDerechos:\n{derechos}\n\nDerecho específico: {right_name}"
        );
        let ctx = SectionContext::default();
        let (ai_text, citations) = self
            .improve(catalog::DERECHOS_VULNERADOS, &user_text, &ctx)
            .await;
        let right = db.upsert_right(case_id, right_name, &ai_text, &citations)?;
        Ok(right)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("generator", &self.generator.is_some())
            .field("retriever", &self.retriever.is_some())
            .field("top_k", &self.top_k)
            .field("enforce_econ_filter", &self.enforce_econ_filter)
            .finish()
    }
}
