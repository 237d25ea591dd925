//! Word and JSON export. The .docx is written directly as minimal
//! WordprocessingML inside a zip container: one document part, one styles
//! part, Times New Roman 12 throughout.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use tutela_core::catalog;
use tutela_core::compose::{evidence_text, numbered_lines, HEADER_FIXED, PRUEBAS_LEAD_IN};
use tutela_core::db::Db;
use tutela_core::parties::join_people;
use tutela_core::types::{Party, PartyRole, Section};

pub const OATH_FALLBACK: &str = "JURAMENTO: Manifiesto bajo la gravedad del juramento que no se \
     ha presentado ninguna otra acción de tutela por los mismos hechos y derechos.";

// ── Paragraph model ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Justify,
}

#[derive(Debug, Clone)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub align: Align,
}

impl Paragraph {
    fn plain(text: &str, bold: bool, align: Align) -> Self {
        Paragraph {
            runs: vec![Run {
                text: text.to_string(),
                bold,
            }],
            align,
        }
    }

    fn empty() -> Self {
        Paragraph {
            runs: Vec::new(),
            align: Align::Left,
        }
    }
}

fn title(text: &str) -> Paragraph {
    Paragraph::plain(&text.to_uppercase(), true, Align::Center)
}

fn body(text: &str) -> Paragraph {
    Paragraph::plain(text, false, Align::Justify)
}

/// Prefixed line like "REF: ..." where only the prefix is bold.
fn labeled(label: &str, value: &str, value_bold: bool) -> Paragraph {
    Paragraph {
        runs: vec![
            Run {
                text: label.to_string(),
                bold: true,
            },
            Run {
                text: value.to_string(),
                bold: value_bold,
            },
        ],
        align: Align::Left,
    }
}

// ── Document layout ───────────────────────────────────────────────────────

/// Builds the printable paragraph sequence for a case. This mirrors the
/// plain-text composer but with docx styling decisions baked in.
pub fn build_paragraphs(db: &Db, case_id: &str) -> Result<Vec<Paragraph>> {
    db.get_case(case_id).map_err(anyhow::Error::new)?;
    let sections: HashMap<String, Section> = db
        .list_sections(case_id)?
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    let accionantes = db.list_parties(case_id, Some(PartyRole::Accionante))?;
    let accionados = db.list_parties(case_id, Some(PartyRole::Accionado))?;

    let pick = |name: &str| -> String {
        sections
            .get(name)
            .map(|s| s.resolved_text().to_string())
            .unwrap_or_default()
    };

    let ref_line = pick(catalog::REF);
    let intro = pick(catalog::INTRO);
    let hechos = pick(catalog::HECHOS);
    let der_vuln = pick(catalog::DERECHOS_VULNERADOS);
    let fund_j = pick(catalog::FUNDAMENTOS_JURIDICOS);
    let fund_d = pick(catalog::FUNDAMENTOS_DE_DERECHO);
    let pret = pick(catalog::PRETENSIONES);
    let notifs = pick(catalog::NOTIFICACIONES);
    let juramento = {
        let j = pick(catalog::CUMPLIMIENTO_ART_37);
        if j.is_empty() {
            OATH_FALLBACK.to_string()
        } else {
            j
        }
    };
    let pya = evidence_text(&sections);

    let mut pars = Vec::new();

    for line in HEADER_FIXED.trim_end().split('\n') {
        pars.push(Paragraph::plain(&line.to_uppercase(), true, Align::Left));
    }

    if !ref_line.is_empty() {
        pars.push(Paragraph::empty());
        pars.push(labeled("REF: ", &ref_line, false));
    }

    pars.push(Paragraph::empty());
    pars.push(labeled(
        "ACCIONANTE(S): ",
        &join_people(&accionantes).to_uppercase(),
        true,
    ));
    pars.push(labeled(
        "ACCIONADO(S): ",
        &join_people(&accionados).to_uppercase(),
        true,
    ));

    for (heading, text) in [
        ("Introducción", &intro),
        ("Hechos", &hechos),
        ("Derechos vulnerados", &der_vuln),
        ("Fundamentos jurídicos", &fund_j),
    ] {
        if !text.is_empty() {
            pars.push(title(heading));
            pars.push(body(text));
        }
    }

    pars.push(title("Pruebas y Anexos"));
    pars.push(body(PRUEBAS_LEAD_IN));
    for line in numbered_lines(&pya) {
        pars.push(body(&line));
    }

    if !pret.trim().is_empty() {
        pars.push(title("Pretensiones"));
        for line in numbered_lines(&pret) {
            pars.push(body(&line));
        }
    }

    if !fund_d.is_empty() {
        pars.push(title("Fundamentos de derecho"));
        for line in numbered_lines(&fund_d) {
            pars.push(body(&line));
        }
    }

    pars.push(title("Cumplimiento art. 37 del Decreto 2591/1991 — Juramento"));
    pars.push(body(&juramento));

    if !notifs.is_empty() {
        pars.push(title("Notificaciones"));
        pars.push(body(&notifs));
    }

    pars.push(Paragraph::empty());
    pars.push(Paragraph::plain("FIRMAS:", true, Align::Left));
    for _ in 0..3 {
        pars.push(Paragraph::empty());
    }
    // Signature blocks come from the live parties table, not the stored
    // firmas row.
    push_signature_blocks(&mut pars, &accionantes);

    Ok(pars)
}

fn push_signature_blocks(pars: &mut Vec<Paragraph>, accionantes: &[Party]) {
    if accionantes.is_empty() {
        // Blank block so the printout is still signable.
        pars.push(Paragraph::plain("______________________________", false, Align::Center));
        pars.push(Paragraph::plain("(NOMBRE DEL ACCIONANTE)", true, Align::Center));
        pars.push(Paragraph::plain("(TIPO DE ID Y NÚMERO)", true, Align::Center));
        return;
    }
    for p in accionantes {
        let nombre = {
            let n = p.display_name();
            if n.is_empty() { "(SIN NOMBRE)".to_string() } else { n.to_uppercase() }
        };
        let ident = {
            let i = p.display_ident();
            if i.is_empty() { "ID — (PENDIENTE)".to_string() } else { i.to_uppercase() }
        };
        pars.push(Paragraph::plain("______________________________", false, Align::Center));
        pars.push(Paragraph::plain(&nombre, true, Align::Center));
        pars.push(Paragraph::plain(&ident, true, Align::Center));
        pars.push(Paragraph::empty());
    }
}

// ── WordprocessingML rendering ────────────────────────────────────────────

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn run_xml(run: &Run) -> String {
    let bold = if run.bold { "<w:b/>" } else { "" };
    format!(
        "<w:r><w:rPr><w:rFonts w:ascii=\"Times New Roman\" w:hAnsi=\"Times New Roman\"/>\
         <w:sz w:val=\"24\"/><w:szCs w:val=\"24\"/>{bold}</w:rPr>\
         <w:t xml:space=\"preserve\">{}</w:t></w:r>",
        xml_escape(&run.text)
    )
}

fn paragraph_xml(par: &Paragraph) -> String {
    let jc = match par.align {
        Align::Left => "",
        Align::Center => "<w:jc w:val=\"center\"/>",
        Align::Justify => "<w:jc w:val=\"both\"/>",
    };
    // Multi-line run text becomes explicit breaks inside one paragraph.
    let runs: String = par
        .runs
        .iter()
        .flat_map(|r| {
            r.text
                .split('\n')
                .map(|line| Run {
                    text: line.to_string(),
                    bold: r.bold,
                })
                .collect::<Vec<_>>()
        })
        .enumerate()
        .map(|(i, r)| {
            if i == 0 {
                run_xml(&r)
            } else {
                format!("<w:r><w:br/></w:r>{}", run_xml(&r))
            }
        })
        .collect();
    format!("<w:p><w:pPr>{jc}</w:pPr>{runs}</w:p>")
}

fn document_xml(pars: &[Paragraph]) -> String {
    let bodies: String = pars.iter().map(paragraph_xml).collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{bodies}<w:sectPr/></w:body></w:document>"
    )
}

const CONTENT_TYPES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
    <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
    <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
    <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
    <Override PartName=\"/word/document.xml\" \
     ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
    </Types>";

const RELS_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
    <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
    <Relationship Id=\"rId1\" \
     Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
     Target=\"word/document.xml\"/>\
    </Relationships>";

/// Writes the paragraphs as a .docx file.
pub fn write_docx(path: &Path, pars: &[Paragraph]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(RELS_XML.as_bytes())?;
    zip.start_file("word/document.xml", options)?;
    zip.write_all(document_xml(pars).as_bytes())?;

    zip.finish().context("failed to finalize docx archive")?;
    Ok(())
}

// ── Export entry point ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ExportUrls {
    pub docx_url: String,
    pub json_url: String,
}

/// Renders the .docx and the JSON bundle side by side under `export_dir`
/// and returns their public locators under /exports/.
pub fn export_case(db: &Db, case_id: &str, export_dir: &str) -> Result<ExportUrls> {
    std::fs::create_dir_all(export_dir)
        .with_context(|| format!("failed to create export dir {export_dir:?}"))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let basename = format!("tutela_{case_id}_{ts}");
    let docx_path = Path::new(export_dir).join(format!("{basename}.docx"));
    let json_path = Path::new(export_dir).join(format!("{basename}.json"));

    let pars = build_paragraphs(db, case_id)?;
    write_docx(&docx_path, &pars)?;

    let bundle = db.case_bundle(case_id).map_err(anyhow::Error::new)?;
    let json = serde_json::to_string_pretty(&bundle).context("failed to serialize case bundle")?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    Ok(ExportUrls {
        docx_url: format!("/exports/{basename}.docx"),
        json_url: format!("/exports/{basename}.json"),
    })
}
