use std::env;

pub(crate) const TUNE_VAR: &str = "HETRT_TUNE";
pub(crate) const PROFILE_VAR: &str = "HETRT_PROFILE";
pub(crate) const PERF_CACHE_VAR: &str = "HETRT_PERF_CACHE";

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// `None` when the variable is unset or blank.
pub(crate) fn flag(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(parse_bool(&value)),
        _ => None,
    }
}

/// `None` when the variable is unset, blank, or not a positive integer.
pub(crate) fn positive_usize(name: &str) -> Option<usize> {
    match env::var(name) {
        Ok(value) => value.trim().parse().ok().filter(|&v: &usize| v > 0),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn accepts_common_truthy_spellings() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["0", "false", "off", "maybe"] {
            assert!(!parse_bool(value), "{value}");
        }
    }
}
