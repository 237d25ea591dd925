//! Fixed section catalog plus the declarative dependency and invalidation
//! tables. The catalog is a closed enumeration: section rows exist for every
//! name here and for nothing else.

// Section names, in document order.
pub const ENCABEZADO: &str = "encabezado";
pub const ACCIONANTES: &str = "accionantes";
pub const ACCIONADOS: &str = "accionados";
pub const INTRO: &str = "intro";
pub const HECHOS: &str = "hechos";
pub const PRUEBAS_Y_ANEXOS: &str = "pruebas_y_anexos";
pub const PRETENSIONES: &str = "pretensiones";
pub const DERECHOS_VULNERADOS: &str = "derechos_vulnerados";
pub const FUNDAMENTOS_JURIDICOS: &str = "fundamentos_juridicos";
pub const FUNDAMENTOS_DE_DERECHO: &str = "fundamentos_de_derecho";
pub const REF: &str = "ref";
pub const CUMPLIMIENTO_ART_37: &str = "cumplimiento_art_37";
pub const NOTIFICACIONES: &str = "notificaciones";
pub const FIRMAS: &str = "firmas";

// Legacy names kept out of the catalog; the composer still reads them for
// cases created before pruebas/anexos were unified.
pub const LEGACY_PRUEBAS: &str = "pruebas";
pub const LEGACY_ANEXOS: &str = "anexos";

#[derive(Debug, Clone, Copy)]
pub struct SectionMeta {
    pub name: &'static str,
    pub needs_llm: bool,
    /// Position in the legal-reasoning chain, for documentation/ordering.
    pub send_order: Option<i64>,
}

pub const CATALOG: &[SectionMeta] = &[
    SectionMeta { name: ENCABEZADO, needs_llm: false, send_order: None },
    SectionMeta { name: ACCIONANTES, needs_llm: false, send_order: None },
    SectionMeta { name: ACCIONADOS, needs_llm: false, send_order: None },
    SectionMeta { name: INTRO, needs_llm: false, send_order: None },
    SectionMeta { name: HECHOS, needs_llm: true, send_order: Some(1) },
    // Improved automatically at save time, not via the explicit improve action.
    SectionMeta { name: PRUEBAS_Y_ANEXOS, needs_llm: false, send_order: None },
    SectionMeta { name: PRETENSIONES, needs_llm: false, send_order: None },
    SectionMeta { name: DERECHOS_VULNERADOS, needs_llm: true, send_order: Some(2) },
    SectionMeta { name: FUNDAMENTOS_JURIDICOS, needs_llm: true, send_order: Some(3) },
    SectionMeta { name: FUNDAMENTOS_DE_DERECHO, needs_llm: true, send_order: Some(4) },
    SectionMeta { name: REF, needs_llm: true, send_order: Some(5) },
    SectionMeta { name: CUMPLIMIENTO_ART_37, needs_llm: false, send_order: None },
    SectionMeta { name: NOTIFICACIONES, needs_llm: false, send_order: None },
    SectionMeta { name: FIRMAS, needs_llm: false, send_order: None },
];

pub fn section_meta(name: &str) -> Option<&'static SectionMeta> {
    CATALOG.iter().find(|m| m.name == name)
}

/// Prerequisites that must have non-empty resolved text before an explicit
/// improve of the keyed section is allowed.
pub const DEPENDENCIES: &[(&str, &[&str])] = &[
    (DERECHOS_VULNERADOS, &[HECHOS]),
    (FUNDAMENTOS_JURIDICOS, &[HECHOS, DERECHOS_VULNERADOS]),
    (FUNDAMENTOS_DE_DERECHO, &[FUNDAMENTOS_JURIDICOS]),
    (REF, &[DERECHOS_VULNERADOS, FUNDAMENTOS_JURIDICOS, FUNDAMENTOS_DE_DERECHO]),
];

pub fn prerequisites(name: &str) -> &'static [&'static str] {
    DEPENDENCIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, deps)| *deps)
        .unwrap_or(&[])
}

/// Sections whose AI/final text is cleared when the keyed section is saved.
/// pretensiones intentionally invalidates nothing: claims for relief do not
/// feed the rights/grounds derivation, only facts and evidence do.
pub const CASCADE: &[(&str, &[&str])] = &[
    (HECHOS, &[DERECHOS_VULNERADOS, FUNDAMENTOS_JURIDICOS, FUNDAMENTOS_DE_DERECHO, REF]),
    (PRUEBAS_Y_ANEXOS, &[FUNDAMENTOS_JURIDICOS, FUNDAMENTOS_DE_DERECHO, REF]),
];

pub fn invalidated_by(name: &str) -> &'static [&'static str] {
    CASCADE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, deps)| *deps)
        .unwrap_or(&[])
}

/// Sections that get an automatic improvement pass when saved.
pub const AUTO_IMPROVE_ON_SAVE: &[&str] = &[HECHOS, PRETENSIONES, PRUEBAS_Y_ANEXOS];
