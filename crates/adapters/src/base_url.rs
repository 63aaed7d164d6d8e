use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/v\d+$").expect("valid regex for version suffix"));

/// Normalises an OpenAI-style base URL. An empty input falls back to
/// `default`; a missing `/vN` suffix gets `/v1`; a trailing `#` opts out of
/// the suffix and is stripped.
pub fn normalize_base_url(input: &str, default: &str) -> String {
    let trimmed = input.trim();
    let raw = if trimmed.is_empty() {
        default.trim()
    } else {
        trimmed
    };
    if raw.is_empty() {
        return String::new();
    }

    if let Some(verbatim) = raw.strip_suffix('#') {
        return verbatim.trim_end_matches('/').to_string();
    }

    let without_slash = raw.trim_end_matches('/');
    if VERSION_SUFFIX_RE.is_match(without_slash) || without_slash.contains("/v1/") {
        without_slash.to_string()
    } else {
        format!("{without_slash}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI: &str = "https://api.openai.com/v1";

    #[test]
    fn empty_input_uses_default() {
        assert_eq!(normalize_base_url("  ", OPENAI), OPENAI);
        assert_eq!(normalize_base_url("", ""), "");
    }

    #[test]
    fn appends_v1_when_missing() {
        assert_eq!(
            normalize_base_url("http://localhost:11434/", OPENAI),
            "http://localhost:11434/v1"
        );
    }

    #[test]
    fn keeps_existing_version() {
        assert_eq!(
            normalize_base_url("https://example.com/v2/", OPENAI),
            "https://example.com/v2"
        );
    }

    #[test]
    fn hash_suffix_keeps_path_verbatim() {
        assert_eq!(
            normalize_base_url("https://proxy.example.com/openai#", OPENAI),
            "https://proxy.example.com/openai"
        );
    }
}
