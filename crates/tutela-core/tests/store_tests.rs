use tutela_core::catalog;
use tutela_core::db::Db;
use tutela_core::types::{Citation, PartyRole, PartyUpsert, SectionStatus};
use tutela_core::DomainError;

fn open_db() -> Db {
    let db = Db::open_in_memory().unwrap();
    db.migrate().unwrap();
    db
}

fn upsert(role: &str, nombres: &str, apellidos: &str) -> PartyUpsert {
    PartyUpsert {
        role: role.to_string(),
        nombres: nombres.to_string(),
        apellidos: apellidos.to_string(),
        tipo_id: "CC".to_string(),
        numero_id: "123456".to_string(),
        ..Default::default()
    }
}

// ── case creation ────────────────────────────────────────────────────────────

#[test]
fn create_case_seeds_full_catalog() {
    let db = open_db();
    let case = db.create_case("Acción de Tutela").unwrap();
    let sections = db.list_sections(&case.id).unwrap();
    assert_eq!(sections.len(), catalog::CATALOG.len());
    for meta in catalog::CATALOG {
        assert!(sections.iter().any(|s| s.name == meta.name), "{}", meta.name);
    }
}

#[test]
fn create_case_seeds_oath_and_ref_defaults() {
    let db = open_db();
    let case = db.create_case("Acción de Tutela").unwrap();
    let oath = db.get_section(&case.id, catalog::CUMPLIMIENTO_ART_37).unwrap();
    assert!(oath.user_text.starts_with("JURAMENTO"));
    assert_eq!(oath.status, SectionStatus::Draft);
    let ref_line = db.get_section(&case.id, catalog::REF).unwrap();
    assert!(ref_line.user_text.contains("derecho a la salud"));
}

#[test]
fn get_case_unknown_id_is_not_found() {
    let db = open_db();
    match db.get_case("nope") {
        Err(DomainError::CaseNotFound(_)) => {}
        other => panic!("expected CaseNotFound, got {other:?}"),
    }
}

// ── section state machine ────────────────────────────────────────────────────

#[test]
fn save_user_text_moves_empty_to_draft() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let s = db.save_user_text(&case.id, catalog::HECHOS, "El 1 de mayo...").unwrap();
    assert_eq!(s.status, SectionStatus::Draft);
    assert_eq!(s.user_text, "El 1 de mayo...");
}

#[test]
fn save_blank_user_text_resets_to_empty() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "algo").unwrap();
    let s = db.save_user_text(&case.id, catalog::HECHOS, "   ").unwrap();
    assert_eq!(s.status, SectionStatus::Empty);
}

#[test]
fn save_ai_text_marks_ai_suggested_and_keeps_user_text() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "borrador").unwrap();
    let s = db.save_ai_text(&case.id, catalog::HECHOS, "1. Hecho mejorado.", &[]).unwrap();
    assert_eq!(s.status, SectionStatus::AiSuggested);
    assert_eq!(s.user_text, "borrador");
    assert_eq!(s.ai_text, "1. Hecho mejorado.");
}

#[test]
fn blank_ai_text_drops_back_to_draft() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "borrador").unwrap();
    let s = db.save_ai_text(&case.id, catalog::HECHOS, "", &[]).unwrap();
    assert_eq!(s.status, SectionStatus::Draft);
}

#[test]
fn save_ai_text_persists_citations() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let cites = vec![Citation {
        title: "T-760/2008".to_string(),
        snippet: "derecho fundamental a la salud".to_string(),
        metadata: serde_json::json!({"source": "corte"}),
    }];
    let s = db
        .save_ai_text(&case.id, catalog::FUNDAMENTOS_DE_DERECHO, "1) C.P., art. 86", &cites)
        .unwrap();
    assert_eq!(s.citations.len(), 1);
    assert_eq!(s.citations[0].title, "T-760/2008");
}

#[test]
fn unknown_section_name_is_rejected() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    match db.save_user_text(&case.id, "capitulo_extra", "x") {
        Err(DomainError::UnknownSection(_)) => {}
        other => panic!("expected UnknownSection, got {other:?}"),
    }
}

// ── approval and versions ────────────────────────────────────────────────────

#[test]
fn approve_from_ai_copies_ai_text_and_records_version() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "crudo").unwrap();
    db.save_ai_text(&case.id, catalog::HECHOS, "pulido", &[]).unwrap();
    let s = db.approve_section(&case.id, catalog::HECHOS, true).unwrap();
    assert_eq!(s.final_text, "pulido");
    assert_eq!(s.status, SectionStatus::Approved);
    assert_eq!(db.count_versions(&case.id, catalog::HECHOS).unwrap(), 1);
}

#[test]
fn approve_from_user_copies_user_text() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::PRETENSIONES, "1. Ordenar la cita.").unwrap();
    let s = db.approve_section(&case.id, catalog::PRETENSIONES, false).unwrap();
    assert_eq!(s.final_text, "1. Ordenar la cita.");
    assert_eq!(s.status, SectionStatus::Approved);
}

#[test]
fn approve_of_blank_source_keeps_status_but_still_versions() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let s = db.approve_section(&case.id, catalog::HECHOS, true).unwrap();
    assert_eq!(s.status, SectionStatus::Empty);
    assert_eq!(s.final_text, "");
    // the decision point is still recorded
    assert_eq!(db.count_versions(&case.id, catalog::HECHOS).unwrap(), 1);
}

#[test]
fn versions_accumulate_append_only() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "v1").unwrap();
    db.approve_section(&case.id, catalog::HECHOS, false).unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "v2").unwrap();
    db.approve_section(&case.id, catalog::HECHOS, false).unwrap();
    assert_eq!(db.count_versions(&case.id, catalog::HECHOS).unwrap(), 2);
}

// ── invalidation ─────────────────────────────────────────────────────────────

#[test]
fn invalidate_clears_ai_and_final_and_forces_draft() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::DERECHOS_VULNERADOS, "usuario").unwrap();
    db.save_ai_text(&case.id, catalog::DERECHOS_VULNERADOS, "ia", &[]).unwrap();
    db.approve_section(&case.id, catalog::DERECHOS_VULNERADOS, true).unwrap();

    db.invalidate_sections(&case.id, &[catalog::DERECHOS_VULNERADOS]).unwrap();
    let s = db.get_section(&case.id, catalog::DERECHOS_VULNERADOS).unwrap();
    assert_eq!(s.ai_text, "");
    assert_eq!(s.final_text, "");
    assert_eq!(s.status, SectionStatus::Draft);
    // user text survives invalidation
    assert_eq!(s.user_text, "usuario");
}

// ── resolved text precedence ─────────────────────────────────────────────────

#[test]
fn resolved_text_prefers_final_then_ai_then_user() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(&case.id, catalog::HECHOS, "usuario").unwrap();
    assert_eq!(db.resolved_text(&case.id, catalog::HECHOS).unwrap(), "usuario");
    db.save_ai_text(&case.id, catalog::HECHOS, "ia", &[]).unwrap();
    assert_eq!(db.resolved_text(&case.id, catalog::HECHOS).unwrap(), "ia");
    db.approve_section(&case.id, catalog::HECHOS, false).unwrap();
    assert_eq!(db.resolved_text(&case.id, catalog::HECHOS).unwrap(), "usuario");
}

// ── parties ──────────────────────────────────────────────────────────────────

#[test]
fn upsert_party_inserts_then_updates() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let p = db.upsert_party(&case.id, &upsert("accionante", "Ana", "Mora")).unwrap();
    assert_eq!(p.role, PartyRole::Accionante);

    let mut edit = upsert("accionante", "Ana María", "Mora");
    edit.id = Some(p.id.clone());
    let p2 = db.upsert_party(&case.id, &edit).unwrap();
    assert_eq!(p2.id, p.id);
    assert_eq!(p2.nombres, "Ana María");
    assert_eq!(db.list_parties(&case.id, None).unwrap().len(), 1);
}

#[test]
fn upsert_party_with_unknown_id_fails() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let mut req = upsert("accionado", "EPS", "Salud Total");
    req.id = Some("deadbeef0000".to_string());
    match db.upsert_party(&case.id, &req) {
        Err(DomainError::PartyNotFound(_)) => {}
        other => panic!("expected PartyNotFound, got {other:?}"),
    }
}

#[test]
fn list_parties_filters_by_role() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &upsert("accionante", "Ana", "Mora")).unwrap();
    db.upsert_party(&case.id, &upsert("accionado", "EPS", "Vida")).unwrap();
    let acc = db.list_parties(&case.id, Some(PartyRole::Accionante)).unwrap();
    assert_eq!(acc.len(), 1);
    assert_eq!(acc[0].nombres, "Ana");
}

// ── rights ───────────────────────────────────────────────────────────────────

#[test]
fn upsert_right_is_idempotent_per_name() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_right(&case.id, "salud", "", &[]).unwrap();
    db.upsert_right(&case.id, "salud", "argumento", &[]).unwrap();
    let rights = db.list_rights(&case.id).unwrap();
    assert_eq!(rights.len(), 1);
    assert_eq!(rights[0].argument_ai, "argumento");
}

#[test]
fn case_bundle_collects_everything() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &upsert("accionante", "Ana", "Mora")).unwrap();
    db.upsert_right(&case.id, "salud", "", &[]).unwrap();
    let bundle = db.case_bundle(&case.id).unwrap();
    assert_eq!(bundle.case.id, case.id);
    assert_eq!(bundle.parties.len(), 1);
    assert_eq!(bundle.sections.len(), catalog::CATALOG.len());
    assert_eq!(bundle.rights_detected.len(), 1);
}
