use serde_json::Value;

/// Strip whole model special tokens (`<|name|>`) and whitespace from both
/// ends of `s`.
///
/// Any other surrounding text is kept, so a strict parse of the result still
/// fails when the payload carries prose or a second value.
pub fn trim_special_tokens(s: &str) -> &str {
    let mut rest = s.trim();
    loop {
        let before = rest.len();
        if let Some(body) = rest.strip_prefix("<|") {
            if let Some(end) = body.find("|>").filter(|&e| is_token_name(&body[..e])) {
                rest = body[end + 2..].trim_start();
            }
        }
        if let Some(body) = rest.strip_suffix("|>") {
            if let Some(start) = body.rfind("<|").filter(|&b| is_token_name(&body[b + 2..])) {
                rest = body[..start].trim_end();
            }
        }
        if rest.len() == before {
            return rest;
        }
    }
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a JSON document that may have been cut off mid-stream.
///
/// Open strings are terminated and open objects/arrays closed. When the
/// completed text still fails to parse, trailing characters are dropped one at
/// a time until it does. Returns `None` if nothing parseable remains.
pub fn parse_partial_json(s: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return Some(v);
    }
    let mut scan = Scanner::default();
    let mut chars: Vec<char> = Vec::with_capacity(s.len() + 4);
    for ch in s.chars() {
        if scan.in_str && ch == '\n' && !scan.escape {
            // raw newlines are not valid inside JSON strings
            chars.extend(['\\', 'n']);
            continue;
        }
        if !scan.feed(ch) {
            return None;
        }
        chars.push(ch);
    }
    if scan.in_str {
        if scan.escape {
            chars.pop();
        }
        chars.push('"');
    }
    let suffix: String = scan.closers.iter().rev().collect();
    while !chars.is_empty() {
        let candidate: String = chars.iter().collect::<String>() + &suffix;
        if let Ok(v) = serde_json::from_str::<Value>(&candidate) {
            return Some(v);
        }
        chars.pop();
    }
    None
}

/// Bracket/quote tracker for the partial parser.
#[derive(Default)]
struct Scanner {
    closers: Vec<char>,
    in_str: bool,
    escape: bool,
}

impl Scanner {
    /// Returns false on a mismatched closing bracket.
    fn feed(&mut self, ch: char) -> bool {
        if self.in_str {
            if self.escape {
                self.escape = false;
            } else if ch == '\\' {
                self.escape = true;
            } else if ch == '"' {
                self.in_str = false;
            }
            return true;
        }
        match ch {
            '"' => self.in_str = true,
            '{' => self.closers.push('}'),
            '[' => self.closers.push(']'),
            '}' | ']' => {
                if self.closers.pop() != Some(ch) {
                    return false;
                }
            }
            _ => {}
        }
        true
    }
}
