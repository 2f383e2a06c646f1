use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_PATTERN: Regex =
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap();
}

/// Abbreviates a view/like count: "1500000" -> "1.5M", "2500" -> "2.5K".
/// Counts below a thousand and non-numeric input come back unchanged.
pub fn format_view_count(count: &str) -> String {
    let Ok(number) = count.trim().parse::<u64>() else {
        return count.to_string();
    };

    // Rounded in whole tenths so halves go up: 1250 -> 1.3K.
    if number >= 1_000_000 {
        let tenths = (number + 50_000) / 100_000;
        format!("{}.{}M", tenths / 10, tenths % 10)
    } else if number >= 1_000 {
        let tenths = (number + 50) / 100;
        format!("{}.{}K", tenths / 10, tenths % 10)
    } else {
        count.to_string()
    }
}

/// Renders an ISO 8601 duration (PT1H2M3S) as "1:02:03", or "5:09" when
/// there is no hour part. Anything unparseable renders as "0:00".
pub fn format_duration(duration: &str) -> String {
    let Some(captures) = DURATION_PATTERN.captures(duration) else {
        return "0:00".to_string();
    };

    let component = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let minutes = component(2);
    let seconds = component(3);

    match captures.get(1) {
        Some(_) => format!("{}:{:02}:{:02}", component(1), minutes, seconds),
        None => format!("{}:{:02}", minutes, seconds),
    }
}

pub fn format_iso8601_date(iso_date: &str) -> String {
    if let Ok(datetime) = iso_date.parse::<chrono::DateTime<chrono::Utc>>() {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        iso_date.to_string()
    }
}
