//! Field extraction over the ordered token sequence of one page.
//!
//! Guides place their fields loosely, so extraction is label-driven: a label
//! token opens a short lookahead window over the following tokens and the
//! first value-shaped token in the window wins. Once a field is filled it is
//! never overwritten by a later match.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// How many tokens after a label are searched for its value.
const LOOKAHEAD: usize = 5;

fn cpf_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{3}\.\d{3}\.\d{3}-\d{2}").expect("valid regex"))
}

fn cnpj_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}").expect("valid regex"))
}

fn amount_label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)valor\s+total").expect("valid regex"))
}

fn amount_value_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:R\$\s*)?\d{1,3}(?:\.\d{3})*,\d{2}").expect("valid regex"))
}

fn period_label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)compet[êe]ncia|rateio|refer[êe]ncia").expect("valid regex"))
}

/// Whole-token match: a month word/abbreviation or number, a slash, and a
/// 2- or 4-digit year. Anchored so a CNPJ ("…/0001-95") can never pass.
fn period_value_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\pL\pN]+/\d{2}(?:\d{2})?$").expect("valid regex"))
}

/// Fields pulled from one page, before the completeness gate.
#[derive(Debug, Default)]
struct FieldAccumulator {
    identifier: Option<String>,
    amount: Option<f64>,
    raw_period: Option<String>,
}

impl FieldAccumulator {
    /// First identifier-shaped token anywhere on the page wins.
    fn offer_identifier(&mut self, token: &str) {
        if self.identifier.is_some() {
            return;
        }
        if let Some(found) = cpf_pattern()
            .find(token)
            .or_else(|| cnpj_pattern().find(token))
        {
            self.identifier = Some(found.as_str().to_string());
        }
    }

    fn offer_amount(&mut self, window: &[String]) {
        if self.amount.is_some() {
            return;
        }
        for candidate in window.iter().take(LOOKAHEAD) {
            if let Some(value) = parse_currency(candidate) {
                self.amount = Some(value);
                return;
            }
        }
    }

    fn offer_period(&mut self, window: &[String]) {
        if self.raw_period.is_some() {
            return;
        }
        for candidate in window.iter().take(LOOKAHEAD) {
            let trimmed = candidate.trim_matches(|c: char| matches!(c, ':' | ';' | ',' | '.'));
            if period_value_pattern().is_match(trimmed) {
                self.raw_period = Some(trimmed.to_string());
                return;
            }
        }
    }
}

/// Result of a completed page scan: amount and period are mandatory,
/// the identifier may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub identifier: Option<String>,
    pub amount: f64,
    pub raw_period: String,
}

/// Parse a Brazilian currency token ("1.234,56", optionally "R$"-prefixed).
fn parse_currency(token: &str) -> Option<f64> {
    let found = amount_value_pattern().find(token)?;
    let cleaned: String = found
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse().ok()
}

/// Single forward scan over the page tokens. Returns `None` when the page has
/// no amount or no period; such pages carry no guide and are dropped.
pub fn extract_fields(tokens: &[String]) -> Option<ExtractedFields> {
    let mut acc = FieldAccumulator::default();

    for (index, token) in tokens.iter().enumerate() {
        acc.offer_identifier(token);
        if amount_label_pattern().is_match(token) {
            acc.offer_amount(&tokens[index + 1..]);
        }
        if period_label_pattern().is_match(token) {
            acc.offer_period(&tokens[index + 1..]);
        }
    }

    match (acc.amount, acc.raw_period) {
        (Some(amount), Some(raw_period)) => Some(ExtractedFields {
            identifier: acc.identifier,
            amount,
            raw_period,
        }),
        (amount, period) => {
            debug!(
                amount_found = amount.is_some(),
                period_found = period.is_some(),
                "page dropped: incomplete fields"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_all_three_fields() {
        let tokens = toks(&[
            "GUIA DA PREVIDÊNCIA SOCIAL",
            "CPF: 123.456.789-00",
            "Competência",
            "Novembro/2024",
            "Valor Total do Documento",
            "R$ 1.100,50",
        ]);
        let fields = extract_fields(&tokens).unwrap();
        assert_eq!(fields.identifier.as_deref(), Some("123.456.789-00"));
        assert_eq!(fields.raw_period, "Novembro/2024");
        assert_eq!(fields.amount, 1100.50);
    }

    #[test]
    fn amount_without_period_yields_nothing() {
        let tokens = toks(&["Valor Total", "100,50"]);
        assert!(extract_fields(&tokens).is_none());
    }

    #[test]
    fn period_without_amount_yields_nothing() {
        let tokens = toks(&["Competência:", "11/2024"]);
        assert!(extract_fields(&tokens).is_none());
    }

    #[test]
    fn first_match_wins_and_is_not_overwritten() {
        let tokens = toks(&[
            "111.222.333-44",
            "Competência",
            "Outubro/2024",
            "Valor Total",
            "50,00",
            "555.666.777-88",
            "Competência",
            "Novembro/2024",
            "Valor Total",
            "999,99",
        ]);
        let fields = extract_fields(&tokens).unwrap();
        assert_eq!(fields.identifier.as_deref(), Some("111.222.333-44"));
        assert_eq!(fields.raw_period, "Outubro/2024");
        assert_eq!(fields.amount, 50.0);
    }

    #[test]
    fn value_must_sit_inside_the_lookahead_window() {
        let tokens = toks(&[
            "Valor Total",
            "a",
            "b",
            "c",
            "d",
            "e",
            "100,50",
            "Competência",
            "11/2024",
        ]);
        // Six tokens between label and value: out of the window.
        assert!(extract_fields(&tokens).is_none());
    }

    #[test]
    fn later_label_fills_a_field_the_first_label_missed() {
        let tokens = toks(&[
            "Valor Total",
            "a",
            "b",
            "c",
            "d",
            "e",
            "Valor Total",
            "200,00",
            "Competência",
            "11/2024",
        ]);
        let fields = extract_fields(&tokens).unwrap();
        assert_eq!(fields.amount, 200.0);
    }

    #[test]
    fn cnpj_shaped_identifier_is_captured() {
        let tokens = toks(&[
            "CNPJ 12.345.678/0001-95",
            "Competência",
            "Janeiro/2025",
            "Valor Total",
            "1.234,56",
        ]);
        let fields = extract_fields(&tokens).unwrap();
        assert_eq!(fields.identifier.as_deref(), Some("12.345.678/0001-95"));
        assert_eq!(fields.amount, 1234.56);
    }

    #[test]
    fn cnpj_slash_fragment_is_not_mistaken_for_a_period() {
        let tokens = toks(&[
            "Competência",
            "12.345.678/0001-95",
            "11/2024",
            "Valor Total",
            "10,00",
        ]);
        let fields = extract_fields(&tokens).unwrap();
        assert_eq!(fields.raw_period, "11/2024");
    }

    #[test]
    fn missing_identifier_is_allowed() {
        let tokens = toks(&["Competência", "Maio/24", "Valor Total", "0,99"]);
        let fields = extract_fields(&tokens).unwrap();
        assert!(fields.identifier.is_none());
        assert_eq!(fields.amount, 0.99);
    }
}
