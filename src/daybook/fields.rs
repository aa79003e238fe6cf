use once_cell::sync::Lazy;
use regex::Regex;

static COMPACT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8}$").unwrap());
static DATE_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{1,4})[^0-9]([0-9]{1,2})[^0-9]([0-9]{2,4})").unwrap());

const TWO_DIGIT_YEAR_PIVOT: u32 = 50;

/// Turn an exported amount into a plain signed number string.
///
/// Thousands separators go, `(123)` becomes `-123`, and anything that is not
/// a digit, `.` or `-` is dropped. Empty stays empty.
pub fn normalize_amount(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let plain = trimmed.replace(',', "");
    let signed = match plain.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => format!("-{inner}"),
        None => plain,
    };

    signed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Best-effort conversion of an exported date to `YYYY-MM-DD`.
///
/// Unrecognized input comes back trimmed but otherwise untouched.
pub fn reformat_date(raw: &str) -> String {
    let raw = raw.trim();

    if COMPACT_DATE.is_match(raw) {
        return format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8]);
    }

    let Some(caps) = DATE_PARTS.captures(raw) else {
        return raw.to_owned();
    };
    let (first, second, last) = (&caps[1], &caps[2], &caps[3]);

    if first.len() == 4 {
        return format!("{first}-{second:0>2}-{last:0>2}");
    }

    let year = if last.len() == 4 {
        last.to_owned()
    } else {
        match last.parse::<u32>() {
            Ok(yy) if yy < TWO_DIGIT_YEAR_PIVOT => (2000 + yy).to_string(),
            Ok(yy) => (1900 + yy).to_string(),
            Err(_) => return raw.to_owned(),
        }
    };

    // Day first, unless the middle group cannot be a month.
    let (day, month) = match (first.parse::<u32>(), second.parse::<u32>()) {
        (Ok(d), Ok(m)) if m > 12 && d <= 12 => (second, first),
        _ => (first, second),
    };

    format!("{year}-{month:0>2}-{day:0>2}")
}
