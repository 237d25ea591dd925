use tutela_core::catalog;
use tutela_core::db::Db;
use tutela_core::parties::{
    compose_people_inline, refresh_after_party_change, substitute_intro_placeholders,
};
use tutela_core::types::PartyUpsert;

fn open_db() -> Db {
    let db = Db::open_in_memory().unwrap();
    db.migrate().unwrap();
    db
}

fn party(role: &str, nombres: &str, apellidos: &str, tipo: &str, num: &str) -> PartyUpsert {
    PartyUpsert {
        role: role.to_string(),
        nombres: nombres.to_string(),
        apellidos: apellidos.to_string(),
        tipo_id: tipo.to_string(),
        numero_id: num.to_string(),
        ..Default::default()
    }
}

// ── placeholder substitution ────────────────────────────────────────────────

#[test]
fn x_placeholders_are_replaced() {
    let out = substitute_intro_placeholders(
        "instauro tutela contra XXXX por la negación del servicio",
        "EPS Vida — NIT 900123",
    );
    assert!(out.contains("EPS Vida — NIT 900123"));
    assert!(!out.contains("XXXX"));
}

#[test]
fn short_x_runs_are_left_alone() {
    let out = substitute_intro_placeholders("el examen XX fue negado", "EPS Vida");
    assert!(out.contains("XX"));
}

#[test]
fn generic_accionado_phrases_are_replaced() {
    for phrase in ["los accionados", "el accionado", "la accionada", "las accionadas"] {
        let out = substitute_intro_placeholders(
            &format!("dirijo esta acción contra {phrase} mencionados"),
            "EPS Vida",
        );
        assert!(out.contains("EPS Vida"), "failed for {phrase:?}");
    }
}

#[test]
fn contra_block_is_rewritten_with_real_parties() {
    let intro = "acudo para instaurar ACCIÓN DE TUTELA contra la entidad que resulte responsable, \
                 con el objeto de que se protejan mis derechos";
    let out = substitute_intro_placeholders(intro, "EPS Vida — NIT 900123");
    assert!(out.contains("ACCIÓN DE TUTELA contra EPS Vida — NIT 900123, con el objeto"));
}

#[test]
fn contra_block_supports_en_contra_variant() {
    let intro = "instauro ACCION DE TUTELA en contra de quien corresponda, con el objeto de que";
    let out = substitute_intro_placeholders(intro, "Hospital San Juan");
    assert!(out.contains("Hospital San Juan, con el objeto"));
}

#[test]
fn dollar_signs_in_names_are_inserted_literally() {
    let out = substitute_intro_placeholders(
        "ACCIÓN DE TUTELA contra alguien, con el objeto de",
        "Empresa $uper S.A.",
    );
    assert!(out.contains("Empresa $uper S.A., con el objeto"));
}

#[test]
fn no_defendants_means_no_substitution() {
    let intro = "tutela contra XXXX, con el objeto de";
    assert_eq!(substitute_intro_placeholders(intro, ""), intro);
}

#[test]
fn substitution_is_idempotent() {
    let intro = "acudo para instaurar ACCIÓN DE TUTELA contra XXXXXXX , con el objeto de que \
                 se protejan mis derechos";
    let once = substitute_intro_placeholders(intro, "EPS Vida — NIT 900123");
    let twice = substitute_intro_placeholders(&once, "EPS Vida — NIT 900123");
    assert!(once.contains("contra EPS Vida — NIT 900123, con el objeto"));
    assert_eq!(once, twice);
}

#[test]
fn substitution_collapses_runs_of_spaces() {
    let out = substitute_intro_placeholders("texto   con    espacios", "EPS");
    assert_eq!(out, "texto con espacios");
}

// ── refresh after party change ──────────────────────────────────────────────

#[test]
fn refresh_creates_base_intro_when_empty() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora", "CC", "123")).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();

    let intro = db.get_section(&case.id, catalog::INTRO).unwrap();
    assert!(intro.user_text.contains("Ana Mora — CC 123"));
    assert!(intro.user_text.contains("artículo 86"));
    assert!(intro.user_text.contains("los accionados"));
}

#[test]
fn refresh_patches_existing_intro_with_defendants() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(
        &case.id,
        catalog::INTRO,
        "instauro ACCIÓN DE TUTELA contra XXXX, con el objeto de que se protejan mis derechos",
    )
    .unwrap();
    db.upsert_party(&case.id, &party("accionado", "EPS", "Vida", "NIT", "900123")).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();

    let intro = db.get_section(&case.id, catalog::INTRO).unwrap();
    assert!(intro.user_text.contains("EPS Vida — NIT 900123"));
}

#[test]
fn refresh_builds_notifications_blocks() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    let mut acc = party("accionante", "Ana", "Mora", "CC", "123");
    acc.telefono = "3001234567".to_string();
    acc.email = "ana@example.com".to_string();
    db.upsert_party(&case.id, &acc).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();

    let notifs = db.get_section(&case.id, catalog::NOTIFICACIONES).unwrap();
    assert!(notifs.user_text.contains("Accionante(s):"));
    assert!(notifs.user_text.contains("Se notificará a Ana Mora"));
    assert!(notifs.user_text.contains("Tel: 3001234567"));
    assert!(notifs.user_text.contains("Correo: ana@example.com"));
    // no defendants registered yet
    assert!(notifs.user_text.contains("Accionado(s):\n(sin datos aún)"));
}

#[test]
fn party_without_contact_data_gets_placeholder() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionado", "EPS", "Vida", "NIT", "900123")).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();
    let notifs = db.get_section(&case.id, catalog::NOTIFICACIONES).unwrap();
    assert!(notifs.user_text.contains("(sin datos de contacto)"));
}

#[test]
fn refresh_builds_signature_block_per_claimant() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora", "CC", "123")).unwrap();
    db.upsert_party(&case.id, &party("accionante", "Luis", "Rojas", "CC", "456")).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();

    let firmas = db.get_section(&case.id, catalog::FIRMAS).unwrap();
    assert_eq!(firmas.user_text, "Ana Mora — CC 123\nLuis Rojas — CC 456");
}

#[test]
fn signature_block_without_claimants_prompts_for_one() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionado", "EPS", "Vida", "NIT", "900123")).unwrap();
    refresh_after_party_change(&db, &case.id).unwrap();
    let firmas = db.get_section(&case.id, catalog::FIRMAS).unwrap();
    assert_eq!(firmas.user_text, "(agrega al menos un accionante para firmar)");
}

#[test]
fn second_refresh_with_same_parties_changes_nothing() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.save_user_text(
        &case.id,
        catalog::INTRO,
        "instauro ACCIÓN DE TUTELA contra XXXXXXX , con el objeto de que se protejan mis derechos",
    )
    .unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora", "CC", "123")).unwrap();
    db.upsert_party(&case.id, &party("accionado", "EPS", "Vida", "NIT", "900123")).unwrap();

    refresh_after_party_change(&db, &case.id).unwrap();
    let intro = db.get_section(&case.id, catalog::INTRO).unwrap();
    let notifs = db.get_section(&case.id, catalog::NOTIFICACIONES).unwrap();
    let firmas = db.get_section(&case.id, catalog::FIRMAS).unwrap();

    refresh_after_party_change(&db, &case.id).unwrap();
    assert_eq!(db.get_section(&case.id, catalog::INTRO).unwrap().user_text, intro.user_text);
    assert_eq!(
        db.get_section(&case.id, catalog::NOTIFICACIONES).unwrap().user_text,
        notifs.user_text
    );
    assert_eq!(db.get_section(&case.id, catalog::FIRMAS).unwrap().user_text, firmas.user_text);
}

// ── inline listing ──────────────────────────────────────────────────────────

#[test]
fn people_inline_joins_with_commas_and_em_dash() {
    let db = open_db();
    let case = db.create_case("t").unwrap();
    db.upsert_party(&case.id, &party("accionante", "Ana", "Mora", "CC", "123")).unwrap();
    db.upsert_party(&case.id, &party("accionante", "Luis", "Rojas", "", "")).unwrap();
    let people = db
        .list_parties(&case.id, Some(tutela_core::types::PartyRole::Accionante))
        .unwrap();
    assert_eq!(compose_people_inline(&people), "Ana Mora — CC 123, Luis Rojas");
}
