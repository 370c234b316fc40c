//! File name patterns used by declaration files and page filters.
//!
//! A pattern starting with `^` or ending with `$` is a regular expression;
//! anything else is a glob:
//!
//! | Glob | Regex |
//! |------|-------|
//! | `*`  | `[^/]*` |
//! | `**` | `.*` |
//! | `?`  | `[^/]` |
//! | `[!a-c]` | `[^a-c]` |

use regex::Regex;
use std::fmt;

/// A compiled glob or regex, always anchored at both ends.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let regex = if pattern.starts_with('^') || pattern.ends_with('$') {
            Regex::new(pattern)?
        } else {
            Regex::new(&glob_to_regex(pattern))?
        };
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// Translate a glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if closed {
                    out.push('[');
                    match class.strip_prefix('!') {
                        Some(rest) => {
                            out.push('^');
                            out.push_str(&rest.replace('\\', "\\\\"));
                        }
                        None => out.push_str(&class.replace('\\', "\\\\")),
                    }
                    out.push(']');
                } else {
                    out.push_str(&regex::escape(&format!("[{class}")));
                }
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}
