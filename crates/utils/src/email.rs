use std::sync::OnceLock;

use regex::Regex;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

/// Shape check for an email address, applied before any network call.
///
/// Deliberately loose: one `@`, no whitespace, a dotted domain. Real
/// deliverability is the mail provider's problem.
pub fn is_valid_email(value: &str) -> bool {
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles"));
    re.is_match(value)
}
