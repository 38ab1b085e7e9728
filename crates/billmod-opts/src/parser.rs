use crate::registry::ArgSet;

/// What the binary should do after a parse pass.
///
/// Ordered by precedence: the banner flag wins over everything, unrecognized
/// tokens over help, help over version, and validation only runs when none of
/// the earlier outcomes applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Internal `-T` flag: print the fixed vendor banner, exit 0.
    Banner,
    /// Tokens matching no registered flag: warn about each, exit 1.
    Unrecognized(Vec<String>),
    /// Help requested (or nothing registered): print usage, exit 0.
    Help,
    /// Version requested: print version, exit 0.
    Version,
    /// Validation failures: report each, print usage, exit 1.
    Invalid(Vec<Problem>),
    /// All flags captured and valid.
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing(String),
    RequiresValue(String),
    InvalidValue(String),
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Problem::Missing(name) => write!(f, "missed argument {}", name),
            Problem::RequiresValue(name) => write!(f, "argument {} requires a value", name),
            Problem::InvalidValue(name) => write!(f, "argument {} has invalid value", name),
        }
    }
}

/// Token class by leading-dash count: positional/sentinel, short cluster, or
/// long form. Three or more dashes classify as long and will not match.
fn token_class(token: &str) -> Option<usize> {
    if token.is_empty() {
        return None;
    }
    if token == "-" || token == "--" {
        return Some(0);
    }
    let dashes = token.find(|c| c != '-').unwrap_or(token.len());
    Some(dashes.min(2))
}

impl ArgSet {
    /// Parse the argument vector (without the program name).
    pub fn parse<I, S>(&mut self, args: I) -> ParseOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut index = 0;
        while index < tokens.len() {
            let next = tokens.get(index + 1).map(|s| s.as_str());
            let skip = self.parse_one(&tokens[index], next);
            index += 1 + skip;
        }
        self.outcome()
    }

    /// Consume one token, returning how many following tokens it swallowed.
    fn parse_one(&mut self, token: &str, next: Option<&str>) -> usize {
        let class = match token_class(token) {
            Some(class) => class,
            None => return 0,
        };
        if class == 0 {
            self.other.push(token.to_string());
            return 0;
        }

        let mut skip = 0;
        let mut parsed = false;
        match class {
            1 => {
                // Short cluster: every registered, not-yet-seen letter found in
                // the token toggles its flag. A value is consumed only when
                // the letter is the last character of the cluster.
                for flag in &mut self.flags {
                    let Some(short) = flag.spec.short else { continue };
                    if flag.exists {
                        continue;
                    }
                    let Some(at) = token.find(short) else { continue };
                    flag.exists = true;
                    parsed = true;
                    if flag.spec.require_value {
                        let last = at == token.len() - short.len_utf8();
                        if last && next.is_some() {
                            flag.value = next.unwrap_or_default().to_string();
                            flag.has_value = true;
                            skip = 1;
                        } else {
                            flag.has_value = false;
                        }
                    }
                }
            }
            _ => {
                for flag in &mut self.flags {
                    let Some(long) = flag.spec.long.as_deref().filter(|l| !l.is_empty()) else {
                        continue;
                    };
                    if token != format!("--{}", long) {
                        continue;
                    }
                    flag.exists = true;
                    parsed = true;
                    if flag.spec.require_value {
                        match next {
                            Some(value) => {
                                flag.value = value.to_string();
                                flag.has_value = true;
                                skip = 1;
                            }
                            None => flag.has_value = false,
                        }
                    }
                }
            }
        }

        if !parsed {
            self.unrecognized.push(token.to_string());
        }
        skip
    }

    fn outcome(&mut self) -> ParseOutcome {
        if self.is_set(self.banner) {
            return ParseOutcome::Banner;
        }
        if !self.unrecognized.is_empty() {
            return ParseOutcome::Unrecognized(self.unrecognized.clone());
        }
        if self.is_set(self.help) || self.flags.is_empty() {
            return ParseOutcome::Help;
        }
        if self.is_set(self.version) {
            return ParseOutcome::Version;
        }

        let mut problems = Vec::new();
        for index in 0..self.flags.len() {
            let mut required = self.flags[index].spec.required;
            let mut require_value = self.flags[index].spec.require_value;

            // First matching dependency edge wins and short-circuits.
            for edge in 0..self.flags[index].spec.depends.len() {
                let (target, ref expected) = self.flags[index].spec.depends[edge];
                if self.flags[target.0].value == *expected {
                    required = true;
                    require_value = true;
                    break;
                }
            }

            // Positional inheritance for flags not supplied by name.
            if !self.flags[index].exists {
                if let Some(position) = self.flags[index].spec.position {
                    if let Some(token) = self.other.get(position).cloned() {
                        let flag = &mut self.flags[index];
                        flag.exists = true;
                        flag.has_value = true;
                        flag.value = token;
                    }
                }
            }

            let flag = &self.flags[index];
            let name = flag.spec.display_name();
            if required && !flag.exists {
                problems.push(Problem::Missing(name.clone()));
            }
            if flag.exists && require_value && !flag.has_value {
                problems.push(Problem::RequiresValue(name.clone()));
            }
            if let Some(validator) = flag.spec.validator {
                if flag.exists && !validator(&flag.value) {
                    problems.push(Problem::InvalidValue(name));
                }
            }
        }

        if problems.is_empty() {
            ParseOutcome::Ready
        } else {
            ParseOutcome::Invalid(problems)
        }
    }
}
