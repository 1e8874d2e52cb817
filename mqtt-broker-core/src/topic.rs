//! Wildcard-aware topic pattern matching.
//!
//! Patterns are `/`-delimited levels. `+` consumes exactly one level; `#`
//! consumes the rest and is only legal as the final level.

/// `true` iff `pattern` contains either wildcard character.
pub fn is_wild(pattern: &str) -> bool {
    pattern.contains('+') || pattern.contains('#')
}

/// `true` iff `topic` is matched by `pattern`. A `#` anywhere but the final
/// level is a structural error and is treated as a non-match rather than a
/// panic.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => {
                // '#' must be the final pattern level.
                return pattern_levels.next().is_none();
            }
            (Some("+"), Some(_)) => continue,
            (Some("+"), None) => return false,
            (Some(p), Some(t)) => {
                if p != t {
                    return false;
                }
            }
            (Some(_), None) => return false,
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}
