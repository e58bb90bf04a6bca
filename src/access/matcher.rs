//! Wildcard path patterns.
//!
//! A pattern holds one path per line. `*` matches any run of characters
//! (including `/`), `?` matches exactly one character and `<front>` stands for
//! the front page. Matching is case-insensitive and anchored at both ends.

use regex::{Regex, RegexBuilder};

const FRONT_PAGE_TOKEN: &str = "<front>";
const FRONT_PAGE_PATH: &str = "/";

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    // `None` for an empty rule set, which never matches.
    regex: Option<Regex>,
}

impl PathPattern {
    pub fn new(patterns: &str) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = patterns
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(translate_line)
            .collect();

        if alternatives.is_empty() {
            return Ok(PathPattern { regex: None });
        }

        let regex = RegexBuilder::new(&format!("^(?:{})$", alternatives.join("|")))
            .case_insensitive(true)
            .build()?;
        Ok(PathPattern { regex: Some(regex) })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(path))
    }
}

fn translate_line(line: &str) -> String {
    if line == FRONT_PAGE_TOKEN {
        return regex::escape(FRONT_PAGE_PATH);
    }

    let mut out = String::with_capacity(line.len() * 2);
    let mut literal = String::new();
    for c in line.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}
