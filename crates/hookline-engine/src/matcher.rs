use anyhow::{Context, Result};
use regex::Regex;

/// Compiled matcher pattern, built once at rule load.
///
/// Matching is pure and case-sensitive: an empty pattern matches every
/// action (including events that carry none), `*` matches any non-empty
/// action name, and anything that is not a plain literal or alternation of
/// literals is compiled as a fully anchored regex.
#[derive(Debug, Clone)]
pub enum Matcher {
    All,
    Exact(String),
    Alternation(Vec<String>),
    Wildcard,
    Regex(Regex),
}

/// Characters allowed in a literal (non-regex) matcher segment
fn is_literal(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Matcher {
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(Matcher::All);
        }
        if pattern == "*" {
            return Ok(Matcher::Wildcard);
        }

        let segments: Vec<&str> = pattern.split('|').collect();
        if segments.iter().all(|s| is_literal(s)) {
            if segments.len() == 1 {
                return Ok(Matcher::Exact(pattern.to_string()));
            }
            return Ok(Matcher::Alternation(
                segments.into_iter().map(str::to_string).collect(),
            ));
        }

        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .with_context(|| format!("invalid matcher pattern '{}'", pattern))?;
        Ok(Matcher::Regex(regex))
    }

    pub fn matches(&self, action: Option<&str>) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Wildcard => action.is_some_and(|a| !a.is_empty()),
            Matcher::Exact(expected) => action == Some(expected.as_str()),
            Matcher::Alternation(options) => {
                action.is_some_and(|a| options.iter().any(|o| o == a))
            }
            Matcher::Regex(regex) => action.is_some_and(|a| regex.is_match(a)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_matches_everything() {
        let m = Matcher::compile("").unwrap();
        assert!(m.matches(Some("Bash")));
        assert!(m.matches(None));
    }

    #[test]
    fn test_wildcard_requires_action_name() {
        let m = Matcher::compile("*").unwrap();
        assert!(m.matches(Some("Bash")));
        assert!(!m.matches(Some("")));
        assert!(!m.matches(None));
    }

    #[test]
    fn test_exact_is_case_sensitive() {
        let m = Matcher::compile("Bash").unwrap();
        assert!(matches!(m, Matcher::Exact(_)));
        assert!(m.matches(Some("Bash")));
        assert!(!m.matches(Some("bash")));
        assert!(!m.matches(Some("BashOutput")));
        assert!(!m.matches(None));
    }

    #[test]
    fn test_alternation_of_literals() {
        let m = Matcher::compile("Write|Edit|MultiEdit").unwrap();
        assert!(matches!(m, Matcher::Alternation(_)));
        assert!(m.matches(Some("Write")));
        assert!(m.matches(Some("Edit")));
        assert!(m.matches(Some("MultiEdit")));
        assert!(!m.matches(Some("Read")));
    }

    #[test]
    fn test_regex_pattern_is_anchored() {
        let m = Matcher::compile("Note.*").unwrap();
        assert!(matches!(m, Matcher::Regex(_)));
        assert!(m.matches(Some("Notebook")));
        assert!(m.matches(Some("NotebookEdit")));
        assert!(!m.matches(Some("MyNotebook")));
    }

    #[test]
    fn test_regex_alternation_with_metacharacters() {
        let m = Matcher::compile("mcp__.*|Bash").unwrap();
        assert!(m.matches(Some("mcp__github__create_pr")));
        assert!(m.matches(Some("Bash")));
        assert!(!m.matches(Some("Write")));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(Matcher::compile("[unclosed").is_err());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let m = Matcher::compile("git.*").unwrap();
        for _ in 0..3 {
            assert!(m.matches(Some("git_commit")));
            assert!(!m.matches(Some("svn")));
        }
    }
}
