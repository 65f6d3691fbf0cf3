//! Pure, deterministic normalization rules (spec.md §4.3). These are never applied by the
//! parser or the introspector — both store surface forms — and are only ever called lazily,
//! by the differ, at the point it compares two values.

use once_cell::sync::Lazy;
use regex::Regex;

/// Case-fold and collapse whitespace, then rewrite known aliases to their canonical spelling.
/// `VARCHAR(n)`/`CHARACTER VARYING(n)` become `character varying(n)`; `DECIMAL(p,s)`/
/// `NUMERIC(p,s)` become `numeric(p,s)`; bare integer aliases collapse to their canonical
/// family name. Unknown types are case-folded and whitespace-collapsed but otherwise passed
/// through unchanged, since the alias table in spec.md §4.3 is explicitly the complete list
/// we canonicalize — anything else is assumed already canonical for its dialect.
pub fn canonical_type(surface: &str) -> String {
    let folded = collapse_whitespace(&surface.to_lowercase());

    static VARCHAR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:varchar|character varying)\((\d+)\)$").unwrap());
    static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:decimal|numeric)\((\d+),\s*(\d+)\)$").unwrap());

    if let Some(caps) = VARCHAR.captures(&folded) {
        return format!("character varying({})", &caps[1]);
    }
    if let Some(caps) = NUMERIC.captures(&folded) {
        return format!("numeric({},{})", &caps[1], &caps[2]);
    }

    match folded.as_str() {
        "int" | "int4" | "integer" | "serial" => "integer".to_string(),
        "int8" | "bigint" | "bigserial" => "bigint".to_string(),
        "int2" | "smallint" | "smallserial" => "smallint".to_string(),
        "text" => "text".to_string(),
        "bool" | "boolean" => "boolean".to_string(),
        "timestamp" | "timestamp without time zone" => "timestamp without time zone".to_string(),
        "timestamptz" | "timestamp with time zone" => "timestamp with time zone".to_string(),
        "decimal" | "numeric" => "numeric".to_string(),
        other => other.to_string(),
    }
}

/// `true` when the surface type is one of the `SERIAL` family, which the differ and parser
/// both need to know about separately from `canonical_type`: a `SERIAL` column implies an
/// owned sequence and an implicit `nextval(...)` default that plain `integer` does not.
pub fn is_serial_alias(surface: &str) -> bool {
    matches!(
        collapse_whitespace(&surface.to_lowercase()).as_str(),
        "serial" | "serial4" | "bigserial" | "serial8" | "smallserial" | "serial2"
    )
}

/// Strip a trailing `::<type>[ with/without time zone][(params)]` cast, preserving `::regclass`
/// casts that appear inside `nextval(...)` (they carry semantic identity: which sequence).
/// Returns `None` only when given `None` — an absent default stays absent; two defaults
/// compare equal iff their canonicalized forms are identical, or both are absent
/// (spec.md §4.3).
pub fn canonical_default(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return Some(String::new());
    }

    if is_nextval_with_regclass(raw) {
        return Some(raw.to_string());
    }

    static CAST: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?is)^(.*?)::\s*[a-z_][a-z0-9_ ]*(?:\s+(?:with|without)\s+time\s+zone)?(?:\(\s*\d+(?:\s*,\s*\d+)?\s*\))?$"#)
            .unwrap()
    });

    let mut current = raw.to_string();
    loop {
        match CAST.captures(&current) {
            Some(caps) if !is_nextval_with_regclass(&current) => {
                let stripped = caps[1].trim().to_string();
                if stripped == current {
                    break;
                }
                current = stripped;
            }
            _ => break,
        }
    }

    Some(current.trim().to_string())
}

fn is_nextval_with_regclass(expr: &str) -> bool {
    let lower = expr.to_lowercase();
    lower.starts_with("nextval(") && lower.contains("::regclass")
}

/// Unquoted identifiers fold to lowercase; quoted identifiers retain their case exactly.
/// `quoted` reflects whether the original SQL wrapped the identifier in double quotes.
pub fn canonical_identifier(raw: &str, quoted: bool) -> String {
    if quoted {
        raw.to_string()
    } else {
        raw.to_lowercase()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
