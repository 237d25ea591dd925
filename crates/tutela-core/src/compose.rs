//! Document composer: concatenates the resolved section texts into the
//! plain-text preview and the structured per-section view the editor
//! renders.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog;
use crate::db::Db;
use crate::error::Result;
use crate::parties;
use crate::types::{PartyRole, Section, SectionStatus};

pub const HEADER_FIXED: &str = "SEÑOR\nJUEZ DE LA REPÚBLICA (REPARTO)\nE. S. D.\n";

pub const PRUEBAS_LEAD_IN: &str = "Con el fin de establecer la vulneración de los derechos, \
     solicito señor Juez se sirva tener en cuenta las siguientes pruebas y anexos:";

/// Numbered list from the non-blank lines of a block, 1-based.
pub fn numbered_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, l)| format!("{}. {}", i + 1, l.trim()))
        .collect()
}

fn resolved(sections: &HashMap<String, Section>, name: &str) -> String {
    sections
        .get(name)
        .map(|s| s.resolved_text().to_string())
        .unwrap_or_default()
}

/// Evidence text with the legacy fallback: the unified section wins, and
/// only when it is blank do the old separate pruebas/anexos rows get glued
/// together.
pub fn evidence_text(sections: &HashMap<String, Section>) -> String {
    let pya = resolved(sections, catalog::PRUEBAS_Y_ANEXOS);
    if !pya.trim().is_empty() {
        return pya;
    }
    [
        resolved(sections, catalog::LEGACY_PRUEBAS),
        resolved(sections, catalog::LEGACY_ANEXOS),
    ]
    .into_iter()
    .filter(|t| !t.trim().is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

/// Full plain-text document for preview. Empty sections are omitted except
/// evidence, which always prints its heading.
pub fn compose_full_text(db: &Db, case_id: &str) -> Result<String> {
    let sections: HashMap<String, Section> = db
        .list_sections(case_id)?
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    let accionantes = db.list_parties(case_id, Some(PartyRole::Accionante))?;
    let accionados = db.list_parties(case_id, Some(PartyRole::Accionado))?;

    let ref_line = resolved(&sections, catalog::REF);
    let intro = resolved(&sections, catalog::INTRO);
    let hechos = resolved(&sections, catalog::HECHOS);
    let der_vuln = resolved(&sections, catalog::DERECHOS_VULNERADOS);
    let fund_j = resolved(&sections, catalog::FUNDAMENTOS_JURIDICOS);
    let fund_d = resolved(&sections, catalog::FUNDAMENTOS_DE_DERECHO);
    let pret = resolved(&sections, catalog::PRETENSIONES);
    let notifs = resolved(&sections, catalog::NOTIFICACIONES);
    let firmas = resolved(&sections, catalog::FIRMAS);
    let juramento = resolved(&sections, catalog::CUMPLIMIENTO_ART_37);
    let pa_text = evidence_text(&sections);

    let mut parts: Vec<String> = vec![HEADER_FIXED.to_string()];

    if !ref_line.is_empty() {
        parts.push(format!("\nREF: {ref_line}"));
    }

    parts.push(format!(
        "\nACCIONANTE(S): {}",
        parties::join_people(&accionantes)
    ));
    parts.push(format!("ACCIONADO(S): {}", parties::join_people(&accionados)));

    for (title, body) in [
        ("Introducción", &intro),
        ("Hechos", &hechos),
        ("Derechos vulnerados", &der_vuln),
        ("Fundamentos jurídicos", &fund_j),
    ] {
        if !body.is_empty() {
            parts.push(format!("\n## {title}"));
            parts.push(body.clone());
        }
    }

    parts.push("\n## Pruebas y Anexos".to_string());
    if pa_text.trim().is_empty() {
        parts.push("(sin registros)".to_string());
    } else {
        parts.push(PRUEBAS_LEAD_IN.to_string());
        parts.extend(numbered_lines(&pa_text));
    }

    if !pret.trim().is_empty() {
        parts.push("\n## Pretensiones".to_string());
        parts.extend(numbered_lines(&pret));
    }

    if !fund_d.is_empty() {
        parts.push("\n## Fundamentos de derecho".to_string());
        parts.extend(numbered_lines(&fund_d));
    }

    if !juramento.trim().is_empty() {
        parts.push("\n## Cumplimiento art. 37 del Decreto 2591/1991 — Juramento".to_string());
        parts.push(juramento.trim().to_string());
    }

    if !notifs.trim().is_empty() {
        parts.push("\n## Notificaciones".to_string());
        parts.push(notifs.trim().to_string());
    }

    // Signatures always print; a blank row falls back to a live recompute
    // from the parties table.
    let firmas_txt = if firmas.trim().is_empty() {
        parties::compose_firmas_text(db, case_id)?
    } else {
        firmas.trim().to_string()
    };
    if !firmas_txt.is_empty() {
        parts.push("\n## Firmas".to_string());
        parts.push(firmas_txt);
    }

    Ok(parts.join("\n").trim().to_string())
}

// ── Structured view ───────────────────────────────────────────────────────

/// Per-layer view of an editable section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionView {
    pub user: String,
    pub ai: String,
    #[serde(rename = "final")]
    pub final_text: String,
    pub status: SectionStatus,
}

impl SectionView {
    fn from_sections(sections: &HashMap<String, Section>, name: &str) -> Self {
        sections
            .get(name)
            .map(|s| SectionView {
                user: s.user_text.clone(),
                ai: s.ai_text.clone(),
                final_text: s.final_text.clone(),
                status: s.status,
            })
            .unwrap_or(SectionView {
                status: SectionStatus::Empty,
                ..Default::default()
            })
    }
}

/// Auto-composed sections, exposed as resolved text only.
#[derive(Debug, Clone, Serialize)]
pub struct AutoSections {
    pub intro: String,
    pub notificaciones: String,
    pub firmas: String,
    pub cumplimiento_art_37: String,
}

/// Chain-generated sections.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSections {
    pub derechos_vulnerados: SectionView,
    pub fundamentos_juridicos: SectionView,
    pub fundamentos_de_derecho: SectionView,
    #[serde(rename = "ref")]
    pub ref_line: SectionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuredDocument {
    pub auto: AutoSections,
    pub hechos: SectionView,
    pub pretensiones: SectionView,
    pub pruebas_y_anexos: SectionView,
    pub generados: GeneratedSections,
}

pub fn compose_structured(db: &Db, case_id: &str) -> Result<StructuredDocument> {
    let sections: HashMap<String, Section> = db
        .list_sections(case_id)?
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();

    Ok(StructuredDocument {
        auto: AutoSections {
            intro: resolved(&sections, catalog::INTRO),
            notificaciones: resolved(&sections, catalog::NOTIFICACIONES),
            firmas: resolved(&sections, catalog::FIRMAS),
            cumplimiento_art_37: resolved(&sections, catalog::CUMPLIMIENTO_ART_37),
        },
        hechos: SectionView::from_sections(&sections, catalog::HECHOS),
        pretensiones: SectionView::from_sections(&sections, catalog::PRETENSIONES),
        pruebas_y_anexos: SectionView::from_sections(&sections, catalog::PRUEBAS_Y_ANEXOS),
        generados: GeneratedSections {
            derechos_vulnerados: SectionView::from_sections(&sections, catalog::DERECHOS_VULNERADOS),
            fundamentos_juridicos: SectionView::from_sections(&sections, catalog::FUNDAMENTOS_JURIDICOS),
            fundamentos_de_derecho: SectionView::from_sections(&sections, catalog::FUNDAMENTOS_DE_DERECHO),
            ref_line: SectionView::from_sections(&sections, catalog::REF),
        },
    })
}
