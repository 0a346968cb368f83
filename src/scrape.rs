// src/scrape.rs
//! Helpers for pulling JSON blobs out of server-rendered pages.

/// Return the balanced JSON object/array that starts at the first `{` or `[`
/// after `marker`. String literals (with escapes) are skipped while counting.
pub fn balanced_json_after<'a>(haystack: &'a str, marker: &str) -> Option<&'a str> {
    let after = haystack.find(marker)? + marker.len();
    let rel = haystack[after..].find(['{', '['])?;
    let start = after + rel;
    balanced_json_at(haystack, start)
}

/// `start` must point at `{` or `[`.
pub fn balanced_json_at(s: &str, start: usize) -> Option<&str> {
    let bytes = s.as_bytes();
    let (open, close) = match bytes.get(start)? {
        b'{' => (b'{', b'}'),
        b'[' => (b'[', b']'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
