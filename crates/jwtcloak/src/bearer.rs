//! Bearer token extraction from `Authorization` header values

const SCHEME: &str = "bearer";

/// Extract the token from an `Authorization` header value
///
/// The `Bearer` scheme is matched case-insensitively and stripped once;
/// surrounding whitespace is ignored. A bare token with no scheme is accepted
/// as-is. Returns `None` for an empty value or a different scheme
/// (`Basic ...`).
///
/// ```rust
/// use jwtcloak::extract_bearer;
///
/// assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer("  bEaReR   abc.def.ghi "), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer("abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer("Basic dXNlcjpwYXNz"), None);
/// assert_eq!(extract_bearer("Bearer "), None);
/// ```
pub fn extract_bearer(value: &str) -> Option<&str> {
    let value = value.trim();

    let token = match value.get(..SCHEME.len()) {
        Some(prefix)
            if prefix.eq_ignore_ascii_case(SCHEME)
                && value[SCHEME.len()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace) =>
        {
            value[SCHEME.len()..].trim_start()
        }
        _ => value,
    };

    (!token.is_empty() && !token.contains(char::is_whitespace)).then_some(token)
}
