use std::borrow::Cow;

const REDACTED: &str = "REDACTED";

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '+' | '/' | '=')
}

/// Replaces the token following every (case-insensitive) `Bearer ` marker.
fn redact_bearer(text: String) -> String {
    const MARKER: &str = "bearer ";
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = find_ascii_case_insensitive(rest, MARKER) {
        out.push_str(&rest[..idx + MARKER.len()]);
        rest = &rest[idx + MARKER.len()..];

        let consumed: usize = rest
            .chars()
            .take_while(|ch| is_token_char(*ch))
            .map(char::len_utf8)
            .sum();
        if consumed > 0 {
            out.push_str(REDACTED);
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

/// Replaces the string value of `"key": "..."` pairs.
fn redact_json_field(text: String, key: &str) -> String {
    let needle = format!("\"{key}\"");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find(&needle) {
        out.push_str(&rest[..idx + needle.len()]);
        rest = &rest[idx + needle.len()..];

        let after_colon = rest.trim_start();
        let Some(value) = after_colon.strip_prefix(':') else {
            continue;
        };
        let value = value.trim_start();
        let Some(body) = value.strip_prefix('"') else {
            continue;
        };
        let Some(end) = body.find('"') else {
            continue;
        };

        let prefix_len = rest.len() - value.len();
        out.push_str(&rest[..prefix_len]);
        out.push('"');
        out.push_str(REDACTED);
        out.push('"');
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Replaces JWT-shaped tokens (`eyJ...`.`...`.`...`).
fn redact_jwts(text: String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find("eyJ") {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx..];
        let len: usize = candidate
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            .map(char::len_utf8)
            .sum();
        let token = &candidate[..len];
        if token.matches('.').count() >= 2 {
            out.push_str(REDACTED);
        } else {
            out.push_str(token);
        }
        rest = &candidate[len..];
    }
    out.push_str(rest);
    out
}

/// Strips bearer credentials, token JSON fields and JWTs from text that may end up in
/// logs or user-facing error messages.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_bearer(input.to_string());
    for key in ["access", "refresh", "access_token", "refresh_token"] {
        value = redact_json_field(value, key);
    }
    value = redact_jwts(value);

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
