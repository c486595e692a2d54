//! Compiles ACL path/name patterns (`kv/app/*`, `service/**`) into anchored
//! regexes. `**` matches across path separators, a single `*` stops at the
//! next `/`.

use regex::Regex;

pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    Regex::new(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_star_does_not_cross_segments() {
        let re = compile("kv/app/*").unwrap();
        assert!(re.is_match("kv/app/config"));
        assert!(!re.is_match("kv/app/sub/config"));
    }

    #[test]
    fn double_star_crosses_segments() {
        let re = compile("kv/app/**").unwrap();
        assert!(re.is_match("kv/app/sub/config"));
    }

    #[test]
    fn exact_pattern_is_anchored() {
        let re = compile("kv/app/config").unwrap();
        assert!(re.is_match("kv/app/config"));
        assert!(!re.is_match("kv/app/configuration"));
        assert!(!re.is_match("prefix/kv/app/config"));
    }

    #[test]
    fn special_chars_are_escaped() {
        let re = compile("kv/app.v1/*").unwrap();
        assert!(re.is_match("kv/app.v1/config"));
        assert!(!re.is_match("kv/appXv1/config"));
    }
}
