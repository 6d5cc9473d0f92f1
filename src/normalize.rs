//! Canonicalization of identifier and competence strings.
//!
//! Both functions are total: any input produces a stable string, never a panic.

/// Month name prefixes (accent-stripped, lower case) to month number.
/// Three letters are enough to tell the Portuguese months apart.
const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("jan", 1),
    ("fev", 2),
    ("mar", 3),
    ("abr", 4),
    ("mai", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("set", 9),
    ("out", 10),
    ("nov", 11),
    ("dez", 12),
];

/// Canonical digit-only identifier key.
///
/// Strips everything but digits; 11 digits or fewer are left-padded with
/// zeros to the CPF length, anything longer (CNPJ shape) is kept as-is.
/// Idempotent: normalizing an already-normalized key is a no-op.
pub fn normalize_identifier(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 11 {
        format!("{digits:0>11}")
    } else {
        digits
    }
}

/// Lower-case a string and fold Portuguese accents so month names compare cleanly.
fn fold_accents(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn parse_month(segment: &str) -> Option<u32> {
    let folded = fold_accents(segment.trim());
    if folded.is_empty() {
        return None;
    }
    if folded.chars().all(|c| c.is_ascii_digit()) {
        let month: u32 = folded.parse().ok()?;
        return (1..=12).contains(&month).then_some(month);
    }
    MONTH_PREFIXES
        .iter()
        .find(|(prefix, _)| folded.starts_with(prefix))
        .map(|&(_, month)| month)
}

fn parse_year(segment: &str) -> Option<u32> {
    let trimmed = segment.trim();
    match trimmed.len() {
        // Guides never predate 2000, so a short year always expands with "20".
        2 if trimmed.chars().all(|c| c.is_ascii_digit()) => {
            trimmed.parse::<u32>().ok().map(|y| 2000 + y)
        }
        4 if trimmed.chars().all(|c| c.is_ascii_digit()) => trimmed.parse().ok(),
        _ => None,
    }
}

fn parse_period(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.trim().splitn(2, '/');
    let month = parse_month(parts.next()?)?;
    let year = parse_year(parts.next()?)?;
    Some((month, year))
}

/// Display form `MM/YYYY`. Unparseable input falls back to the trimmed,
/// lower-cased original rather than failing.
pub fn period_display(raw: &str) -> String {
    match parse_period(raw) {
        Some((month, year)) => format!("{month:02}/{year}"),
        None => raw.trim().to_lowercase(),
    }
}

/// Lookup form `YYYY-MM`, used as the reconciliation key.
pub fn period_key(raw: &str) -> String {
    match parse_period(raw) {
        Some((month, year)) => format!("{year}-{month:02}"),
        None => raw.trim().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_strips_and_pads_to_cpf_length() {
        assert_eq!(normalize_identifier("123.456.789-00"), "12345678900");
        assert_eq!(normalize_identifier("12"), "00000000012");
    }

    #[test]
    fn identifier_keeps_cnpj_length() {
        assert_eq!(normalize_identifier("12.345.678/0001-95"), "12345678000195");
    }

    #[test]
    fn identifier_is_idempotent() {
        for raw in ["123.456.789-00", "12", "", "12.345.678/0001-95", "abc"] {
            let once = normalize_identifier(raw);
            assert_eq!(normalize_identifier(&once), once);
        }
    }

    #[test]
    fn period_accepts_month_names_and_numbers() {
        assert_eq!(period_display("Março/24"), "03/2024");
        assert_eq!(period_display("03/2024"), "03/2024");
        assert_eq!(period_display("março/2024"), "03/2024");
        assert_eq!(period_display("MARCO/2024"), "03/2024");
        assert_eq!(period_display("nov/24"), "11/2024");
    }

    #[test]
    fn period_key_matches_display_semantics() {
        assert_eq!(period_key("Março/24"), "2024-03");
        assert_eq!(period_key("03/2024"), "2024-03");
        assert_eq!(period_key("Novembro/2024"), "2024-11");
    }

    #[test]
    fn unparseable_period_falls_back_to_lowercased_original() {
        assert_eq!(period_key("sem competência"), "sem competência");
        assert_eq!(period_display("  N/A "), "n/a");
        assert_eq!(period_key(""), "");
    }

    #[test]
    fn rejects_out_of_range_months() {
        assert_eq!(period_key("13/2024"), "13/2024");
        assert_eq!(period_key("0/2024"), "0/2024");
    }
}
