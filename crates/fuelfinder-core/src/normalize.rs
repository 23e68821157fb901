//! Value clean-up applied to upstream records before they are stored.

/// Strip city/postcode fragments that upstream sometimes duplicates onto the
/// end of the first address line.
///
/// Suffixes are tried longest first: `", {city}, {postcode}"`,
/// `"{city}, {postcode}"`, `", {postcode}"`, then the bare postcode. Each
/// matching suffix is removed once, in that order. A blank postcode disables
/// the clean-up entirely.
#[must_use]
pub fn cleanse_address_line1(address_line1: &str, city: &str, postcode: &str) -> String {
    if postcode.trim().is_empty() {
        return address_line1.to_string();
    }

    let suffixes = [
        format!(", {city}, {postcode}"),
        format!("{city}, {postcode}"),
        format!(", {postcode}"),
        postcode.to_string(),
    ];

    let mut cleansed = address_line1;
    for suffix in &suffixes {
        if let Some(stripped) = cleansed.strip_suffix(suffix.as_str()) {
            cleansed = stripped;
        }
    }
    cleansed.to_string()
}

/// Convert a raw upstream price into pence.
///
/// This is a best-effort heuristic, not a unit-tagged conversion. Upstream
/// sometimes reports pounds (`1.459`) and sometimes tenths of a penny
/// (`1459`), so values below 10 are scaled up by 100 and values above 1000
/// are scaled down by 10. Everything else is assumed to already be pence.
#[must_use]
pub fn normalize_price(raw: f64) -> f64 {
    if raw < 10.0 {
        raw * 100.0
    } else if raw > 1000.0 {
        raw / 10.0
    } else {
        raw
    }
}
