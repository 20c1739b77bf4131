//! Plain scalar safety checks used when choosing a scalar style.

/// Returns true if `s` would be read back as something other than a string
/// when written plain: null, a YAML 1.1 boolean, a number or a special float.
pub(crate) fn resolves_as_non_string(s: &str) -> bool {
    if s.is_empty() || s == "~" || s.eq_ignore_ascii_case("null") {
        return true;
    }
    if s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("false")
        || s.eq_ignore_ascii_case("y")
        || s.eq_ignore_ascii_case("yes")
        || s.eq_ignore_ascii_case("n")
        || s.eq_ignore_ascii_case("no")
        || s.eq_ignore_ascii_case("on")
        || s.eq_ignore_ascii_case("off")
    {
        return true;
    }
    // Numeric-looking tokens: if it parses as a number, plain style would change its type.
    if s.parse::<i64>().is_ok() || s.parse::<u64>().is_ok() || s.parse::<f64>().is_ok() {
        return true;
    }
    if crate::parse_scalars::parse_integer(s, false).is_some() {
        return true;
    }
    let sl = s.to_ascii_lowercase();
    matches!(sl.as_str(), ".nan" | ".inf" | "+.inf" | "-.inf")
}

fn starts_with_indicator(s: &str) -> bool {
    let bytes = s.as_bytes();
    if s.starts_with("---") || s.starts_with("...") {
        return true;
    }
    match bytes[0] {
        // `-5`, `?x` and `:x` are plain; the indicator needs a following space.
        b'-' | b'?' | b':' => bytes.get(1).is_none_or(|b| b.is_ascii_whitespace()),
        b => {
            b.is_ascii_whitespace()
                || matches!(
                    b,
                    b'[' | b']'
                        | b'{'
                        | b'}'
                        | b'#'
                        | b'&'
                        | b'*'
                        | b'!'
                        | b'|'
                        | b'>'
                        | b'\''
                        | b'"'
                        | b'%'
                        | b'@'
                        | b'`'
                        | b','
                )
        }
    }
}

/// Returns true if `s` can be emitted as a plain mapping key without quoting.
#[inline]
pub(crate) fn is_plain_key_safe(s: &str) -> bool {
    if s.is_empty() || starts_with_indicator(s) {
        return false;
    }
    if s.chars().any(|c| c.is_control()) {
        return false;
    }
    if s.ends_with(' ') || s.contains(':') || s.contains('#') {
        return false;
    }
    true
}

/// Returns true if `s` can be emitted as a plain scalar in VALUE position without quoting.
///
/// This is slightly more permissive than `is_plain_key_safe`: it allows ':' inside values
/// unless followed by a space. In flow context commas and brackets are structural, so
/// strings containing them are quoted there.
#[inline]
pub(crate) fn is_plain_value_safe(s: &str, in_flow: bool) -> bool {
    if s.is_empty() || starts_with_indicator(s) {
        return false;
    }
    if s.ends_with(' ') || s.ends_with(':') {
        return false;
    }
    // Yet while colon is ok, colon after space is not.
    if s.contains(": ") || s.contains(" #") {
        return false;
    }
    if s.chars().any(|c| c.is_control()) {
        return false;
    }
    if in_flow && contains_any(s, &[',', '[', ']', '{', '}']) {
        return false;
    }
    true
}

fn contains_any(string: &str, values: &[char]) -> bool {
    string.chars().any(|x| values.contains(&x))
}
