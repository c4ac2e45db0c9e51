//! Contract source payloads and wrapper normalization.
//!
//! Packaging tools wrap the entry expression of a source in module-export
//! or self-invoking syntax. Normalization strips comments and unwraps
//! those layers to recover the bare entry, so that the same logical
//! source keys identically no matter how it was bundled.

use crate::core::TxId;

/// A resolved contract source: the payload text of a source transaction
/// plus the tags that steer compilation.
#[derive(Clone, Debug)]
pub struct ContractSource {
    pub tx_id: TxId,
    pub text: String,
    pub content_type: Option<String>,
}

impl ContractSource {
    /// The normalized entry expression of this source.
    pub fn entry(&self) -> String {
        normalize_source(&self.text)
    }
}

/// Strip comments and unwrap module-export / self-invoking wrappers until
/// a fixpoint is reached.
pub fn normalize_source(text: &str) -> String {
    let mut current = strip_comments(text).trim().to_string();
    loop {
        let next = unwrap_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove `// ...` and `/* ... */` comments, leaving quoted strings
/// untouched.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
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
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn unwrap_once(s: &str) -> String {
    let s = s.trim().trim_end_matches(';').trim();
    for prefix in [
        "export default ",
        "module.exports =",
        "exports.default =",
        "export ",
    ] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    if let Some(inner) = unwrap_iife(s) {
        return inner;
    }
    s.to_string()
}

/// `(function () { return X; })()` / `(() => X)()` / `(() => { return X; })()`
fn unwrap_iife(s: &str) -> Option<String> {
    let body = s.strip_suffix("()")?.trim();
    let body = body.strip_prefix('(')?.strip_suffix(')')?.trim();

    if let Some(rest) = body.strip_prefix("()") {
        let rest = rest.trim_start().strip_prefix("=>")?.trim();
        return Some(unwrap_block_return(rest));
    }
    if body.starts_with("function") {
        let open = body.find('{')?;
        let close = body.rfind('}')?;
        if close <= open {
            return None;
        }
        let inner = body[open + 1..close].trim();
        let inner = inner.strip_prefix("return")?.trim();
        return Some(inner.trim_end_matches(';').trim().to_string());
    }
    None
}

fn unwrap_block_return(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(inner) = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        let inner = inner.trim();
        if let Some(returned) = inner.strip_prefix("return") {
            return returned.trim().trim_end_matches(';').trim().to_string();
        }
    }
    trimmed.to_string()
}
