pub(crate) fn normalize_id(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Splits a ranked course list written as `A; B; C` (also accepts `|` and `,`).
pub(crate) fn split_course_list(value: &str) -> Vec<String> {
    value
        .split([';', '|', ','])
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .collect()
}

/// Parses grades written with either a decimal point or a decimal comma.
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned = normalize_id(value).replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}
