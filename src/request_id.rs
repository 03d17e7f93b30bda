use std::sync::OnceLock;

use regex::Regex;

// RFC-shaped UUID, version nibble 1-5, variant nibble 8/9/a/b.
const REQUEST_ID_PATTERN: &str =
    "[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}";

fn request_id_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(REQUEST_ID_PATTERN).expect("valid regex"))
}

pub fn extract_request_id(input: &str) -> Option<&str> {
    request_id_regex()
        .find(input)
        .map(|found| found.as_str())
}
