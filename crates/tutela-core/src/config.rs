use std::collections::HashMap;

use anyhow::Result;

/// Service configuration, loaded from the environment with a .env fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub export_dir: String,
    pub static_dir: String,

    pub bind: String,
    pub port: u16,

    // LLM backend (Ollama-compatible chat API). Empty URL disables generation.
    pub llm_url: String,
    pub llm_model: String,
    pub llm_timeout_s: u64,

    // Retrieval service. Empty URL disables RAG.
    pub retriever_url: String,
    pub top_k: usize,

    /// Reject pretensiones that name money. Off by default.
    pub enforce_econ_filter: bool,
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_bool(key: &str, dotenv: &HashMap<String, String>, default: bool) -> bool {
    match get(key, dotenv).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_usize(key: &str, dotenv: &HashMap<String, String>, default: usize) -> usize {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Ok(Config {
            db_path: get_str("TUTELA_DB", &dotenv, "data/tutelas.db"),
            export_dir: get_str("TUTELA_EXPORT_DIR", &dotenv, "exports"),
            static_dir: get_str("TUTELA_STATIC_DIR", &dotenv, "static"),
            bind: get_str("TUTELA_BIND", &dotenv, "127.0.0.1"),
            port: get_u16("TUTELA_PORT", &dotenv, 8000),
            llm_url: get_str("TUTELA_LLM_URL", &dotenv, ""),
            llm_model: get_str("TUTELA_LLM_MODEL", &dotenv, "llama3.1"),
            llm_timeout_s: get_u64("TUTELA_LLM_TIMEOUT_S", &dotenv, 120),
            retriever_url: get_str("TUTELA_RETRIEVER_URL", &dotenv, ""),
            top_k: get_usize("TUTELA_TOP_K", &dotenv, 8),
            enforce_econ_filter: get_bool("TUTELA_ENFORCE_ECON_FILTER", &dotenv, false),
        })
    }
}
