use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::catalog::{self, section_meta};
use crate::error::DomainError;
use crate::types::{
    Case, CaseBundle, CaseSummary, Citation, Party, PartyRole, PartyUpsert, RightDetected,
    Section, SectionStatus,
};

const SCHEMA_SQL: &str = include_str!("../../../schema.sql");

/// Default oath text seeded into cumplimiento_art_37 at case creation.
pub const OATH_DEFAULT: &str = "JURAMENTO: Manifiesto bajo la gravedad del juramento que no se \
                                ha presentado ninguna otra acción de tutela por los mismos hechos y derechos.";

/// Initial reference line, overwritten later by the chain.
pub const REF_DEFAULT: &str = "Acción de Tutela para proteger el derecho a la salud en conexidad \
                               con el derecho a la vida.";

pub struct Db {
    conn: Mutex<Connection>,
}

// ── Timestamp / id helpers ────────────────────────────────────────────────

fn parse_ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn now_str() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 12-hex-char identifier for cases and parties.
pub fn new_id() -> String {
    let bytes: [u8; 6] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_citations(json: &str) -> Vec<Citation> {
    serde_json::from_str(json).unwrap_or_default()
}

// ── Row mappers ───────────────────────────────────────────────────────────

fn row_to_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<Case> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(Case {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_party(row: &rusqlite::Row<'_>) -> rusqlite::Result<Party> {
    let role_str: String = row.get(2)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    Ok(Party {
        id: row.get(0)?,
        case_id: row.get(1)?,
        role: PartyRole::parse(&role_str).unwrap_or(PartyRole::Accionante),
        nombres: row.get(3)?,
        apellidos: row.get(4)?,
        tipo_id: row.get(5)?,
        numero_id: row.get(6)?,
        email: row.get(7)?,
        telefono: row.get(8)?,
        direccion: row.get(9)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_section(row: &rusqlite::Row<'_>) -> rusqlite::Result<Section> {
    let status_str: String = row.get(8)?;
    let citations_json: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let needs_llm: i64 = row.get(6)?;
    Ok(Section {
        id: row.get(0)?,
        case_id: row.get(1)?,
        name: row.get(2)?,
        user_text: row.get(3)?,
        ai_text: row.get(4)?,
        final_text: row.get(5)?,
        needs_llm: needs_llm != 0,
        send_order: row.get(7)?,
        status: SectionStatus::parse(&status_str),
        citations: parse_citations(&citations_json),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_right(row: &rusqlite::Row<'_>) -> rusqlite::Result<RightDetected> {
    let sources_json: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(RightDetected {
        id: row.get(0)?,
        case_id: row.get(1)?,
        right_name: row.get(2)?,
        argument_ai: row.get(3)?,
        sources: parse_citations(&sources_json),
        updated_at: parse_ts(&updated_at),
    })
}

const SECTION_COLS: &str = "id, case_id, name, user_text, ai_text, final_text, needs_llm, \
                            send_order, status, citations, updated_at";

// ── Db impl ───────────────────────────────────────────────────────────────

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database at {path:?}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("failed to set PRAGMAs")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("failed to set PRAGMAs")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to apply schema migrations")?;
        Ok(())
    }

    pub fn raw_conn(&self) -> &Mutex<Connection> {
        &self.conn
    }

    // ── Cases ─────────────────────────────────────────────────────────────

    /// Creates a case, eagerly materializes every catalog section, and seeds
    /// the oath and initial reference defaults.
    pub fn create_case(&self, title: &str) -> Result<Case, DomainError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let case_id = new_id();
        let now = now_str();
        conn.execute(
            "INSERT INTO cases (id, title, status, created_at, updated_at) \
             VALUES (?1, ?2, 'draft', ?3, ?3)",
            params![case_id, title, now],
        )
        .context("create_case")?;

        for meta in catalog::CATALOG {
            conn.execute(
                "INSERT INTO sections \
                 (case_id, name, user_text, ai_text, final_text, needs_llm, send_order, status, citations, updated_at) \
                 VALUES (?1, ?2, '', '', '', ?3, ?4, 'empty', '[]', ?5)",
                params![case_id, meta.name, meta.needs_llm as i64, meta.send_order, now],
            )
            .context("create_case: seed section")?;
        }

        conn.execute(
            "UPDATE sections SET user_text = ?1, status = 'draft' WHERE case_id = ?2 AND name = ?3",
            params![OATH_DEFAULT, case_id, catalog::CUMPLIMIENTO_ART_37],
        )
        .context("create_case: seed oath")?;
        conn.execute(
            "UPDATE sections SET user_text = ?1, status = 'draft' WHERE case_id = ?2 AND name = ?3",
            params![REF_DEFAULT, case_id, catalog::REF],
        )
        .context("create_case: seed ref")?;

        let case = conn
            .query_row(
                "SELECT id, title, status, created_at, updated_at FROM cases WHERE id = ?1",
                params![case_id],
                row_to_case,
            )
            .context("create_case: read back")?;
        Ok(case)
    }

    pub fn get_case(&self, case_id: &str) -> Result<Case, DomainError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let case = conn
            .query_row(
                "SELECT id, title, status, created_at, updated_at FROM cases WHERE id = ?1",
                params![case_id],
                row_to_case,
            )
            .optional()
            .context("get_case")?;
        case.ok_or_else(|| DomainError::CaseNotFound(case_id.to_string()))
    }

    pub fn touch_case(&self, case_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "UPDATE cases SET updated_at = ?1 WHERE id = ?2",
            params![now_str(), case_id],
        )
        .context("touch_case")?;
        Ok(())
    }

    pub fn list_cases(&self) -> Result<Vec<CaseSummary>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, title, status, updated_at FROM cases ORDER BY updated_at DESC",
        )?;
        let cases = stmt
            .query_map([], |row| {
                let updated_at: String = row.get(3)?;
                Ok(CaseSummary {
                    case_id: row.get(0)?,
                    title: row.get(1)?,
                    status: row.get(2)?,
                    updated_at: parse_ts(&updated_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_cases")?;
        Ok(cases)
    }

    pub fn case_bundle(&self, case_id: &str) -> Result<CaseBundle, DomainError> {
        let case = self.get_case(case_id)?;
        let parties = self.list_parties(case_id, None)?;
        let sections = self.list_sections(case_id)?;
        let rights_detected = self.list_rights(case_id)?;
        Ok(CaseBundle {
            case,
            parties,
            sections,
            rights_detected,
        })
    }

    // ── Parties ───────────────────────────────────────────────────────────

    pub fn list_parties(&self, case_id: &str, role: Option<PartyRole>) -> Result<Vec<Party>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, case_id, role, nombres, apellidos, tipo_id, numero_id, email, \
             telefono, direccion, created_at, updated_at \
             FROM parties WHERE case_id = ?1 AND (?2 IS NULL OR role = ?2) \
             ORDER BY role, created_at, rowid",
        )?;
        let parties = stmt
            .query_map(params![case_id, role.map(|r| r.as_str())], row_to_party)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_parties")?;
        Ok(parties)
    }

    /// Insert (no id) or update (id present) a party record. Returns the
    /// stored row. The caller is responsible for the auto-composer refresh.
    pub fn upsert_party(&self, case_id: &str, req: &PartyUpsert) -> Result<Party, DomainError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let now = now_str();
        let pid = match req.id.as_deref().map(str::trim) {
            Some(pid) if !pid.is_empty() => {
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT id FROM parties WHERE id = ?1 AND case_id = ?2",
                        params![pid, case_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("upsert_party: lookup")?;
                if exists.is_none() {
                    return Err(DomainError::PartyNotFound(pid.to_string()));
                }
                conn.execute(
                    "UPDATE parties SET role = ?1, nombres = ?2, apellidos = ?3, tipo_id = ?4, \
                     numero_id = ?5, email = ?6, telefono = ?7, direccion = ?8, updated_at = ?9 \
                     WHERE id = ?10 AND case_id = ?11",
                    params![
                        req.role.trim(),
                        req.nombres.trim(),
                        req.apellidos.trim(),
                        req.tipo_id.trim(),
                        req.numero_id.trim(),
                        req.email.trim(),
                        req.telefono.trim(),
                        req.direccion.trim(),
                        now,
                        pid,
                        case_id
                    ],
                )
                .context("upsert_party: update")?;
                pid.to_string()
            }
            _ => {
                let pid = new_id();
                conn.execute(
                    "INSERT INTO parties \
                     (id, case_id, role, nombres, apellidos, tipo_id, numero_id, email, \
                      telefono, direccion, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                    params![
                        pid,
                        case_id,
                        req.role.trim(),
                        req.nombres.trim(),
                        req.apellidos.trim(),
                        req.tipo_id.trim(),
                        req.numero_id.trim(),
                        req.email.trim(),
                        req.telefono.trim(),
                        req.direccion.trim(),
                        now
                    ],
                )
                .context("upsert_party: insert")?;
                pid
            }
        };
        let party = conn
            .query_row(
                "SELECT id, case_id, role, nombres, apellidos, tipo_id, numero_id, email, \
                 telefono, direccion, created_at, updated_at FROM parties WHERE id = ?1",
                params![pid],
                row_to_party,
            )
            .context("upsert_party: read back")?;
        Ok(party)
    }

    // ── Sections ──────────────────────────────────────────────────────────

    pub fn list_sections(&self, case_id: &str) -> Result<Vec<Section>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&format!(
            "SELECT {SECTION_COLS} FROM sections WHERE case_id = ?1 ORDER BY id"
        ))?;
        let sections = stmt
            .query_map(params![case_id], row_to_section)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_sections")?;
        Ok(sections)
    }

    /// Section lookup constrained to the fixed catalog. Unknown names are
    /// NotFound regardless of what rows exist.
    pub fn get_section(&self, case_id: &str, name: &str) -> Result<Section, DomainError> {
        if section_meta(name).is_none() {
            return Err(DomainError::UnknownSection(name.to_string()));
        }
        self.try_section(case_id, name)?
            .ok_or_else(|| DomainError::SectionNotFound(name.to_string()))
    }

    /// Raw row lookup without catalog validation; used by the composer for
    /// the legacy pruebas/anexos fallback.
    pub fn try_section(&self, case_id: &str, name: &str) -> Result<Option<Section>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let section = conn
            .query_row(
                &format!("SELECT {SECTION_COLS} FROM sections WHERE case_id = ?1 AND name = ?2"),
                params![case_id, name],
                row_to_section,
            )
            .optional()
            .context("try_section")?;
        Ok(section)
    }

    /// Resolved text of a section, or "" when the row does not exist.
    pub fn resolved_text(&self, case_id: &str, name: &str) -> Result<String> {
        Ok(self
            .try_section(case_id, name)?
            .map(|s| s.resolved_text().to_string())
            .unwrap_or_default())
    }

    /// Save human-authored text. Non-blank → draft, blank → empty.
    pub fn save_user_text(
        &self,
        case_id: &str,
        name: &str,
        text: &str,
    ) -> Result<Section, DomainError> {
        if section_meta(name).is_none() {
            return Err(DomainError::UnknownSection(name.to_string()));
        }
        let status = if text.trim().is_empty() {
            SectionStatus::Empty
        } else {
            SectionStatus::Draft
        };
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let n = conn
            .execute(
                "UPDATE sections SET user_text = ?1, status = ?2, updated_at = ?3 \
                 WHERE case_id = ?4 AND name = ?5",
                params![text, status.as_str(), now_str(), case_id, name],
            )
            .context("save_user_text")?;
        if n == 0 {
            return Err(DomainError::SectionNotFound(name.to_string()));
        }
        drop(conn);
        self.get_section(case_id, name)
    }

    /// Store AI output. Non-blank → ai_suggested, blank → draft. Never
    /// touches user_text.
    pub fn save_ai_text(
        &self,
        case_id: &str,
        name: &str,
        ai_text: &str,
        citations: &[Citation],
    ) -> Result<Section, DomainError> {
        if section_meta(name).is_none() {
            return Err(DomainError::UnknownSection(name.to_string()));
        }
        let status = if ai_text.trim().is_empty() {
            SectionStatus::Draft
        } else {
            SectionStatus::AiSuggested
        };
        let citations_json =
            serde_json::to_string(citations).context("save_ai_text: serialize citations")?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let n = conn
            .execute(
                "UPDATE sections SET ai_text = ?1, status = ?2, citations = ?3, updated_at = ?4 \
                 WHERE case_id = ?5 AND name = ?6",
                params![ai_text, status.as_str(), citations_json, now_str(), case_id, name],
            )
            .context("save_ai_text")?;
        if n == 0 {
            return Err(DomainError::SectionNotFound(name.to_string()));
        }
        drop(conn);
        self.get_section(case_id, name)
    }

    /// Copy the chosen source text into final_text. Status flips to
    /// approved only when that text is non-blank. A version row is appended
    /// unconditionally: every approve call is a recorded decision point.
    pub fn approve_section(
        &self,
        case_id: &str,
        name: &str,
        from_ai: bool,
    ) -> Result<Section, DomainError> {
        let current = self.get_section(case_id, name)?;
        let final_text = if from_ai {
            current.ai_text.clone()
        } else {
            current.user_text.clone()
        };
        let status = if final_text.trim().is_empty() {
            current.status
        } else {
            SectionStatus::Approved
        };
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let now = now_str();
        conn.execute(
            "UPDATE sections SET final_text = ?1, status = ?2, updated_at = ?3 \
             WHERE case_id = ?4 AND name = ?5",
            params![final_text, status.as_str(), now, case_id, name],
        )
        .context("approve_section")?;
        conn.execute(
            "INSERT INTO versions (case_id, section_name, final_text_snapshot, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![case_id, name, final_text, now],
        )
        .context("approve_section: version")?;
        drop(conn);
        self.get_section(case_id, name)
    }

    /// Clear AI/final text and force draft for every listed section, to
    /// force regeneration after an upstream edit.
    pub fn invalidate_sections(&self, case_id: &str, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let now = now_str();
        for name in names {
            conn.execute(
                "UPDATE sections SET ai_text = '', final_text = '', status = 'draft', \
                 updated_at = ?1 WHERE case_id = ?2 AND name = ?3",
                params![now, case_id, name],
            )
            .context("invalidate_sections")?;
        }
        Ok(())
    }

    pub fn count_versions(&self, case_id: &str, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count = conn
            .query_row(
                "SELECT COUNT(*) FROM versions WHERE case_id = ?1 AND section_name = ?2",
                params![case_id, name],
                |row| row.get(0),
            )
            .context("count_versions")?;
        Ok(count)
    }

    // ── Rights ────────────────────────────────────────────────────────────

    /// Idempotent upsert keyed on (case_id, right_name).
    pub fn upsert_right(
        &self,
        case_id: &str,
        right_name: &str,
        argument_ai: &str,
        sources: &[Citation],
    ) -> Result<RightDetected> {
        let sources_json =
            serde_json::to_string(sources).context("upsert_right: serialize sources")?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO rights_detected (case_id, right_name, argument_ai, sources, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(case_id, right_name) DO UPDATE SET \
               argument_ai = excluded.argument_ai, \
               sources = excluded.sources, \
               updated_at = excluded.updated_at",
            params![case_id, right_name, argument_ai, sources_json, now_str()],
        )
        .context("upsert_right")?;
        let right = conn
            .query_row(
                "SELECT id, case_id, right_name, argument_ai, sources, updated_at \
                 FROM rights_detected WHERE case_id = ?1 AND right_name = ?2",
                params![case_id, right_name],
                row_to_right,
            )
            .context("upsert_right: read back")?;
        Ok(right)
    }

    pub fn list_rights(&self, case_id: &str) -> Result<Vec<RightDetected>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, case_id, right_name, argument_ai, sources, updated_at \
             FROM rights_detected WHERE case_id = ?1 ORDER BY right_name",
        )?;
        let rights = stmt
            .query_map(params![case_id], row_to_right)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_rights")?;
        Ok(rights)
    }
}
