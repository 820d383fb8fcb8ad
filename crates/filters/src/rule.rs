/// Action taken when a rule matches a path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterAction {
    /// Re-include the matching path (a `!pattern` line).
    Include,
    /// Exclude the matching path.
    Exclude,
}

/// One exclude-file line: an action and the pattern text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterRule {
    action: FilterAction,
    pattern: String,
}

impl FilterRule {
    /// Creates an include (negation) rule for `pattern`.
    #[must_use]
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Include,
            pattern: pattern.into(),
        }
    }

    /// Creates an exclude rule for `pattern`.
    #[must_use]
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Exclude,
            pattern: pattern.into(),
        }
    }

    /// Parses one line of gitignore-style text.
    ///
    /// Returns `None` for blank lines and comments. A leading `!` flips the
    /// rule to include; `\!` and `\#` escape the special leading characters.
    /// Unescaped trailing spaces are stripped.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = trim_trailing_unescaped(line);
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        if let Some(rest) = line.strip_prefix('!') {
            if rest.is_empty() {
                return None;
            }
            return Some(Self::include(rest));
        }
        let line = line
            .strip_prefix("\\!")
            .map(|rest| format!("!{rest}"))
            .or_else(|| line.strip_prefix("\\#").map(|rest| format!("#{rest}")))
            .unwrap_or_else(|| line.to_string());
        Some(Self::exclude(line))
    }

    /// Returns the rule action.
    #[must_use]
    pub const fn action(&self) -> FilterAction {
        self.action
    }

    /// Returns the pattern text associated with the rule.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn trim_trailing_unescaped(line: &str) -> &str {
    let mut end = line.len();
    let bytes = line.as_bytes();
    while end > 0 && bytes[end - 1] == b' ' {
        if end >= 2 && bytes[end - 2] == b'\\' {
            break;
        }
        end -= 1;
    }
    &line[..end]
}
