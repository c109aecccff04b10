/// Canonical form of a card UID used as the lookup key.
///
/// Readers disagree on presentation (`04:a1:b2:c3`, `04-A1-B2-C3`,
/// `04a1b2c3`); separators and whitespace are dropped and hex digits are
/// upper-cased. The raw UID is still what goes into the audit trail.
pub fn normalize_uid(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
