use tutela_core::catalog;
use tutela_core::compose::{compose_full_text, compose_structured, numbered_lines, HEADER_FIXED};
use tutela_core::db::Db;
use tutela_core::types::{PartyUpsert, SectionStatus};

fn open_db() -> Db {
    let db = Db::open_in_memory().unwrap();
    db.migrate().unwrap();
    db
}

fn party(role: &str, nombres: &str, apellidos: &str) -> PartyUpsert {
    PartyUpsert {
        role: role.to_string(),
        nombres: nombres.to_string(),
        apellidos: apellidos.to_string(),
        tipo_id: "CC".to_string(),
        numero_id: "99".to_string(),
        ..Default::default()
    }
}

// ── numbered lists ───────────────────────────────────────────────────────────

#[test]
fn numbered_lines_skip_blanks_and_trim() {
    let lines = numbered_lines("  primero \n\n segundo\n   \ntercero");
    assert_eq!(lines, vec!["1. primero", "2. segundo", "3. tercero"]);
}

// ── full text ────────────────────────────────────────────────────────────────

#[test]
fn document_opens_with_fixed_header() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.starts_with(HEADER_FIXED.trim_end()));
    assert!(text.contains("SEÑOR\nJUEZ DE LA REPÚBLICA (REPARTO)\nE. S. D."));
}

#[test]
fn ref_line_is_prefixed() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    // cases are seeded with a default ref
    assert!(text.contains("REF: Acción de Tutela para proteger el derecho a la salud"));
}

#[test]
fn party_lines_always_present() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora")).unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("ACCIONANTE(S): Ana Mora — CC 99"));
    assert!(text.contains("ACCIONADO(S): "));
}

#[test]
fn empty_sections_are_omitted_but_evidence_heading_stays() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(!text.contains("## Hechos"));
    assert!(!text.contains("## Derechos vulnerados"));
    assert!(text.contains("## Pruebas y Anexos"));
    assert!(text.contains("(sin registros)"));
}

#[test]
fn evidence_gets_lead_in_and_numbering() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::PRUEBAS_Y_ANEXOS, "Historia clínica\nDerecho de petición radicado").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("solicito señor Juez"));
    assert!(text.contains("1. Historia clínica"));
    assert!(text.contains("2. Derecho de petición radicado"));
}

#[test]
fn pretensiones_and_statutes_are_renumbered() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::PRETENSIONES, "ordenar la cita\nordenar el medicamento").unwrap();
    db.save_user_text(&case.id, catalog::FUNDAMENTOS_DE_DERECHO, "C.P., art. 86\nD. 2591 de 1991").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("## Pretensiones\n1. ordenar la cita\n2. ordenar el medicamento"));
    assert!(text.contains("## Fundamentos de derecho\n1. C.P., art. 86\n2. D. 2591 de 1991"));
}

#[test]
fn approved_text_wins_over_ai_and_user() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "crudo").unwrap();
    db.save_ai_text(&case.id, catalog::HECHOS, "mejorado", &[]).unwrap();
    db.approve_section(&case.id, catalog::HECHOS, true).unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("## Hechos\nmejorado"));
}

#[test]
fn blank_firmas_recomputed_from_parties() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora")).unwrap();
    // firmas row never refreshed; composer must still show the claimant
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("## Firmas\nAna Mora — CC 99"));
}

#[test]
fn oath_section_prints_with_heading() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let text = compose_full_text(&db, &case.id).unwrap();
    assert!(text.contains("## Cumplimiento art. 37 del Decreto 2591/1991 — Juramento"));
    assert!(text.contains("JURAMENTO: Manifiesto bajo la gravedad"));
}

// ── structured view ──────────────────────────────────────────────────────────

#[test]
fn structured_view_splits_layers() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "crudo").unwrap();
    db.save_ai_text(&case.id, catalog::HECHOS, "mejorado", &[]).unwrap();
    let doc = compose_structured(&db, &case.id).unwrap();
    assert_eq!(doc.hechos.user, "crudo");
    assert_eq!(doc.hechos.ai, "mejorado");
    assert_eq!(doc.hechos.final_text, "");
    assert_eq!(doc.hechos.status, SectionStatus::AiSuggested);
}

#[test]
fn structured_view_exposes_auto_sections_resolved() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let doc = compose_structured(&db, &case.id).unwrap();
    assert!(doc.auto.cumplimiento_art_37.starts_with("JURAMENTO"));
    assert_eq!(doc.generados.derechos_vulnerados.status, SectionStatus::Empty);
}
