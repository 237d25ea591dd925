//! Rights lexicon matcher: maps free text to the closed set of
//! fundamental-right categories via keyword pattern families. Matching is
//! case- and accent-insensitive and purely a function of the input string.

use std::sync::LazyLock;

use regex::Regex;

/// Category name → keyword phrases. Keywords are stored pre-folded
/// (lowercase, no diacritics) except where an accented variant is common
/// enough to list separately.
pub const RIGHTS_LEXICON: &[(&str, &[&str])] = &[
    (
        "salud",
        &[
            "salud", "derecho a la salud", "ips", "eps", "ese", "hospital", "clinica",
            "urgencias", "triage", "cita", "oportunidad en la atencion", "remision",
            "traslado", "autorizacion", "negacion del servicio", "medicamento",
            "medicamentos", "tratamiento", "terapia", "cirugia", "procedimiento",
            "examen", "orden medica", "formula medica", "historia clinica", "mipres",
            "pbs", "pos", "no pbs", "no pos", "cups", "cie10", "rehabilitacion",
            "consulta externa", "glosa", "barrera administrativa",
        ],
    ),
    (
        "vida digna",
        &[
            "vida digna", "existencia digna", "indigno", "condiciones inhumanas",
            "tratos crueles", "riesgo vital", "amenaza a la vida", "supervivencia",
            "dignidad humana",
        ],
    ),
    (
        "minimo vital",
        &[
            "minimo vital", "subsistencia", "alimento", "alimentos", "sustento",
            "canasta basica", "ayuda humanitaria", "auxilio", "privacion de ingresos",
            "no pago de salarios", "pago atrasado",
        ],
    ),
    (
        "debido proceso",
        &[
            "debido proceso", "defensa", "contradiccion", "imparcialidad", "legalidad",
            "procedimiento", "actuacion administrativa", "proceso disciplinario",
            "sumario", "notificacion", "notificado", "traslado", "termino", "plazo",
            "vencimiento de termino", "recursos", "recurso de reposicion", "apelacion",
            "queja", "nulidad", "pruebas", "audiencia", "motivacion",
            "resolucion motivada", "silencio administrativo",
        ],
    ),
    (
        "educacion",
        &[
            "educacion", "colegio", "institucion educativa", "universidad", "matricula",
            "matrícula", "cupos", "traslado escolar", "certificados", "acta de grado",
            "diploma", "pae", "transporte escolar", "ajustes razonables",
            "inclusion educativa", "docente de apoyo", "material pedagogico",
        ],
    ),
    (
        "seguridad social",
        &[
            "seguridad social", "pension", "pensión", "colpensiones", "rais", "afp",
            "arl", "caja de compensacion", "cotizacion", "cotizaciones",
            "historia laboral", "semanas cotizadas", "licencia de maternidad",
            "incapacidad", "subsidio familiar", "ibc",
        ],
    ),
    (
        "peticion",
        &[
            "derecho de peticion", "peticion", "pqrs", "pqr", "pqrds", "radicado",
            "respuesta", "no respondio", "no contesto", "termino de 15 dias",
            "quince dias", "informacion solicitada", "entrega de informacion",
            "trasparencia", "ley 1755",
        ],
    ),
    (
        "igualdad",
        &[
            "igualdad", "no discriminacion", "discriminacion", "trato desigual",
            "enfoque diferencial", "discapacidad", "enfoque de genero",
            "orientacion sexual", "identidad de genero", "poblacion afro",
            "pueblos indigenas", "adulto mayor", "migrante",
        ],
    ),
    (
        "habeas data",
        &[
            "habeas data", "datos personales", "proteccion de datos",
            "actualizacion de datos", "rectificacion de datos", "supresion de datos",
            "autorizacion de datos", "historia crediticia", "centrales de riesgo",
            "datacredito", "cifin", "reporte negativo",
        ],
    ),
    (
        "libertad de expresion",
        &[
            "libertad de expresion", "censura", "retiro de contenido",
            "bloqueo de cuenta", "opinion", "informacion veraz", "rectificacion",
        ],
    ),
    (
        "trabajo",
        &[
            "trabajo", "empleo", "contrato laboral", "despido", "salario",
            "prestaciones", "acoso laboral", "estabilidad laboral reforzada",
            "fuero de salud", "fuero sindical", "reintegro", "nomina",
            "pago de horas",
        ],
    ),
    (
        "vivienda digna",
        &[
            "vivienda digna", "desalojo", "reubicacion", "techo", "hacinamiento",
            "servicios publicos", "energia", "agua", "gas", "corte del servicio",
            "facturacion", "suspension del servicio",
        ],
    ),
    (
        "agua potable",
        &[
            "agua potable", "acueducto", "alcantarillado", "saneamiento basico",
            "corte de agua", "suspension de agua", "carrotanque", "potabilizacion",
        ],
    ),
    (
        "ambiente sano",
        &[
            "ambiente sano", "contaminacion", "ruido", "emisiones", "desechos",
            "basuras", "licencia ambiental", "impacto ambiental",
        ],
    ),
    (
        "libertad personal",
        &[
            "libertad personal", "habeas corpus", "retencion", "captura",
            "privacion de la libertad", "traslado carcelario", "inpec", "upj",
            "demora en audiencia",
        ],
    ),
    (
        "familia y niniez",
        &[
            "familia", "unidad familiar", "custodia", "visitas", "icbf",
            "comisaria de familia", "interes superior del menor", "nna",
            "proteccion integral", "restablecimiento de derechos",
        ],
    ),
    (
        "personas con discapacidad",
        &[
            "discapacidad", "certificado de discapacidad", "ajustes razonables",
            "rehabilitacion", "ayudas tecnicas", "silla de ruedas", "accesibilidad",
            "lengua de senas", "lector de pantalla",
        ],
    ),
    (
        "maternidad",
        &[
            "mujer gestante", "maternidad", "control prenatal",
            "licencia de maternidad", "lactancia", "fuero de maternidad",
            "sala de lactancia",
        ],
    ),
];

/// Lowercases and strips the diacritics that occur in Spanish legal text,
/// so "Cirugía" and "cirugia" fold to the same key.
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            _ => c,
        })
        .collect()
}

fn compile_keyword(keyword: &str) -> Option<Regex> {
    let folded = fold(keyword);
    let folded = folded.trim();
    if folded.is_empty() {
        return None;
    }
    // Flexible whitespace between words: "derecho de peticion" matches
    // across line breaks and double spaces.
    let escaped = folded
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    // Bare alphanumeric tokens get word boundaries so "pos" does not fire
    // inside "posible"; multi-word phrases match anywhere by design to
    // catch paraphrases.
    let pattern = if folded.chars().all(|c| c.is_ascii_alphanumeric()) {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };
    Regex::new(&pattern).ok()
}

static RIGHT_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    RIGHTS_LEXICON
        .iter()
        .map(|(right, keywords)| {
            let patterns = keywords.iter().filter_map(|k| compile_keyword(k)).collect();
            (*right, patterns)
        })
        .collect()
});

/// Returns the lexically sorted set of right categories whose keyword
/// patterns match anywhere in `text`. Pure and deterministic.
pub fn detect_rights(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let folded = fold(text);
    let mut found: Vec<String> = RIGHT_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| p.is_match(&folded)))
        .map(|(right, _)| (*right).to_string())
        .collect();
    found.sort();
    found
}
