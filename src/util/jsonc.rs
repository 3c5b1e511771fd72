//! JSON-with-comments preprocessing.
//!
//! Package manifests and toolchain descriptor files allow `//` and `/* */`
//! comments plus trailing commas. The scanner here strips those down to
//! strict JSON so the document can be handed to `serde_json`. Comment
//! markers inside string literals are left untouched.

/// Strip comments and trailing commas, preserving string literals.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    // Keep line numbers stable for parse errors.
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            ',' => {
                // Buffer the comma: drop it if the next significant token
                // closes the containing object/array.
                let mut lookahead = chars.clone();
                let mut trailing = false;
                while let Some(&next) = lookahead.peek() {
                    if next.is_whitespace() {
                        lookahead.next();
                        continue;
                    }
                    trailing = next == '}' || next == ']';
                    break;
                }
                if !trailing {
                    out.push(',');
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Parse a JSON-with-comments document into a `serde_json::Value`.
pub fn parse(input: &str) -> serde_json::Result<serde_json::Value> {
    serde_json::from_str(&strip_comments(input))
}
