//! Auto-composed party-derived sections: intro, notificaciones and firmas.
//! These are deterministic renderings of the parties table; the refresh
//! functions run after every party upsert so the document never drifts from
//! the registered people.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::catalog;
use crate::db::Db;
use crate::types::{Party, PartyRole};

// Placeholder runs like "XXXX" left by users for the yet-unknown defendant.
static X_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)X{3,}").unwrap_or_else(|_| unreachable!())
});
// Generic phrases: "los accionados", "el accionado", "la accionada".
static RE_SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(l[oa]s?\s+accionad[oa]s?)\b").unwrap_or_else(|_| unreachable!())
});
// The "... TUTELA (en) contra <X> , con el objeto ..." span.
static RE_CONTRA_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(ACCI[ÓO]N\s+DE\s+TUTELA\s+(?:en\s+)?contra\s+)(.*?)(,\s+con\s+el\s+objeto)")
        .unwrap_or_else(|_| unreachable!())
});
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").unwrap_or_else(|_| unreachable!()));

pub fn normalize_spaces(s: &str) -> String {
    SPACES_RE.replace_all(s.trim(), " ").into_owned()
}

/// "Nombre — TIPO NUM, Nombre2 — TIPO NUM" for every party of the role that
/// has at least a name.
pub fn compose_people_inline(parties: &[Party]) -> String {
    parties
        .iter()
        .map(Party::inline_label)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// "Nombre — TIPO NUM; ..." listing used by the composer and export headers.
pub fn join_people(parties: &[Party]) -> String {
    parties
        .iter()
        .map(Party::inline_label)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Swaps the "contra <...> , con el objeto" span for the real defendants.
/// Built with a closure replacer so names containing `$` are inserted
/// literally.
fn replace_contra_segment(txt: &str, accionados_inline: &str) -> String {
    if txt.trim().is_empty() || accionados_inline.trim().is_empty() {
        return txt.to_string();
    }
    RE_CONTRA_BLOCK
        .replace_all(txt, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], accionados_inline, &caps[3])
        })
        .into_owned()
}

fn base_intro(accionante_display: &str, accionado_display: &str) -> String {
    format!(
        "{accionante_display}, identificado como aparece al pie de mi firma, actuando en nombre propio, \
         invocando el artículo 86 de la Constitución Política, acudo ante su Despacho para instaurar \
         ACCIÓN DE TUTELA contra {accionado_display}, con el objeto de que se protejan los derechos \
         constitucionales fundamentales que a continuación enuncio y los cuales se fundamentan en los \
         siguientes hechos."
    )
}

/// Placeholder substitution applied to a user-saved intro: X-runs, generic
/// "los accionados" phrases and the contra block all become the registered
/// defendants. Returns the normalized text.
pub fn substitute_intro_placeholders(text: &str, accionados_inline: &str) -> String {
    let mut out = text.to_string();
    if !accionados_inline.trim().is_empty() {
        out = X_RE.replace_all(&out, accionados_inline).into_owned();
        out = RE_SENTINEL.replace_all(&out, accionados_inline).into_owned();
        out = replace_contra_segment(&out, accionados_inline);
    }
    normalize_spaces(&out)
}

/// Regenerates or patches the intro from the current parties. An empty intro
/// gets the base template; an existing one only has its placeholders
/// substituted, and is re-saved only when that actually changed something.
pub fn refresh_intro(db: &Db, case_id: &str) -> Result<()> {
    let current = db
        .try_section(case_id, catalog::INTRO)?
        .map(|s| {
            // user text wins here: the substitution targets what the human
            // typed, not an AI suggestion.
            for t in [&s.user_text, &s.final_text, &s.ai_text] {
                if !t.trim().is_empty() {
                    return normalize_spaces(t);
                }
            }
            String::new()
        })
        .unwrap_or_default();

    let accionantes = db.list_parties(case_id, Some(PartyRole::Accionante))?;
    let accionados = db.list_parties(case_id, Some(PartyRole::Accionado))?;
    let acc_str = compose_people_inline(&accionantes);
    let ads_str = compose_people_inline(&accionados);

    if current.is_empty() {
        let accionado_display = if ads_str.is_empty() {
            "los accionados"
        } else {
            &ads_str
        };
        let accionante_display = if acc_str.is_empty() {
            "El accionante"
        } else {
            &acc_str
        };
        let intro = base_intro(accionante_display, accionado_display);
        db.save_user_text(case_id, catalog::INTRO, &intro)
            .map_err(anyhow::Error::from)?;
        return Ok(());
    }

    let new_txt = substitute_intro_placeholders(&current, &ads_str);
    if new_txt != current {
        db.save_user_text(case_id, catalog::INTRO, &new_txt)
            .map_err(anyhow::Error::from)?;
    }
    Ok(())
}

fn notifications_block(label: &str, people: &[Party]) -> String {
    if people.is_empty() {
        return format!("{label}:\n(sin datos aún)");
    }
    let lines: Vec<String> = people
        .iter()
        .map(|p| {
            let mut campos = Vec::new();
            if !p.telefono.trim().is_empty() {
                campos.push(format!("Tel: {}", p.telefono.trim()));
            }
            if !p.email.trim().is_empty() {
                campos.push(format!("Correo: {}", p.email.trim()));
            }
            if !p.direccion.trim().is_empty() {
                campos.push(format!("Dirección: {}", p.direccion.trim()));
            }
            let tail = if campos.is_empty() {
                "(sin datos de contacto)".to_string()
            } else {
                campos.join(" | ")
            };
            format!("Se notificará a {} — {tail}", p.display_name())
                .trim()
                .to_string()
        })
        .collect();
    format!("{label}:\n{}", lines.join("\n"))
}

pub fn compose_notifications_text(db: &Db, case_id: &str) -> Result<String> {
    let accionantes = db.list_parties(case_id, Some(PartyRole::Accionante))?;
    let accionados = db.list_parties(case_id, Some(PartyRole::Accionado))?;
    let acc = notifications_block("Accionante(s)", &accionantes);
    let ads = notifications_block("Accionado(s)", &accionados);
    Ok(format!("{acc}\n\n{ads}"))
}

pub fn compose_firmas_text(db: &Db, case_id: &str) -> Result<String> {
    let accionantes = db.list_parties(case_id, Some(PartyRole::Accionante))?;
    if accionantes.is_empty() {
        return Ok("(agrega al menos un accionante para firmar)".to_string());
    }
    let lines: Vec<String> = accionantes
        .iter()
        .map(|p| {
            let nombre = {
                let n = p.display_name();
                if n.is_empty() { "(sin nombre)".to_string() } else { n }
            };
            let ident = {
                let i = p.display_ident();
                if i.is_empty() { "ID — (pendiente)".to_string() } else { i }
            };
            format!("{nombre} — {ident}")
        })
        .collect();
    Ok(lines.join("\n"))
}

pub fn refresh_notifications(db: &Db, case_id: &str) -> Result<()> {
    let txt = compose_notifications_text(db, case_id)?;
    db.save_user_text(case_id, catalog::NOTIFICACIONES, &txt)
        .map_err(anyhow::Error::from)?;
    Ok(())
}

pub fn refresh_firmas(db: &Db, case_id: &str) -> Result<()> {
    let txt = compose_firmas_text(db, case_id)?;
    db.save_user_text(case_id, catalog::FIRMAS, &txt)
        .map_err(anyhow::Error::from)?;
    Ok(())
}

/// Full refresh run after every party upsert.
pub fn refresh_after_party_change(db: &Db, case_id: &str) -> Result<()> {
    refresh_intro(db, case_id)?;
    refresh_notifications(db, case_id)?;
    refresh_firmas(db, case_id)?;
    Ok(())
}
