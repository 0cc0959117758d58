//! Route pattern matching.
//!
//! A pattern is matched against a request path in one left-to-right pass over
//! both strings. There is no backtracking: a parameter always consumes up to
//! the next `/`, even when that starves a parameter that follows it.
//!
//! ## Pattern syntax
//! - literal characters match themselves exactly
//! - `:name` captures one non-empty run of characters up to the next `/`
//! - `:name?` is the same, but may capture nothing; an empty optional
//!   parameter is left out of the result instead of stored as `""`
//! - `*` at the end matches any remainder, including none; `*` followed by a
//!   literal character consumes up to the next occurrence of that character

/// Upper bound on the number of parameters a single match may carry.
pub const MAX_PARAMS: usize = 16;

/// Parameters extracted from a path, in pattern order with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an earlier value for the same name.
    ///
    /// Returns `false` without storing anything when the set is already at
    /// [`MAX_PARAMS`] and `name` is new.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value.into();
            return true;
        }
        if self.entries.len() >= MAX_PARAMS {
            return false;
        }
        self.entries.push((name, value.into()));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outcome of matching one pattern against one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub params: Params,
}

impl MatchResult {
    fn miss() -> Self {
        Self::default()
    }

    fn hit(params: Params) -> Self {
        Self { matched: true, params }
    }
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Match `path` against `pattern`, extracting named parameters.
pub fn match_path(pattern: &str, path: &str) -> MatchResult {
    let pat = pattern.as_bytes();
    let input = path.as_bytes();
    let mut p = 0;
    let mut s = 0;
    let mut params = Params::new();

    while p < pat.len() {
        match pat[p] {
            b':' => {
                let name_start = p + 1;
                let name_end = name_start
                    + pat[name_start..].iter().take_while(|&&b| is_name_byte(b)).count();
                let optional = pat.get(name_end) == Some(&b'?');

                let value_end = input[s..]
                    .iter()
                    .position(|&b| b == b'/')
                    .map_or(input.len(), |i| s + i);

                if value_end == s {
                    if !optional {
                        return MatchResult::miss();
                    }
                } else {
                    let Some(value) = path.get(s..value_end) else {
                        return MatchResult::miss();
                    };
                    params.insert(&pattern[name_start..name_end], value);
                }

                s = value_end;
                p = if optional { name_end + 1 } else { name_end };
            }
            b'*' => {
                let Some(&delimiter) = pat.get(p + 1) else {
                    return MatchResult::hit(params);
                };
                match input[s..].iter().position(|&b| b == delimiter) {
                    Some(i) => s += i,
                    None => return MatchResult::miss(),
                }
                p += 1;
            }
            literal => {
                if input.get(s) == Some(&literal) {
                    p += 1;
                    s += 1;
                    continue;
                }
                if s == input.len() && only_optional_params(&pat[p..]) {
                    return MatchResult::hit(params);
                }
                return MatchResult::miss();
            }
        }
    }

    if s == input.len() {
        MatchResult::hit(params)
    } else {
        MatchResult::miss()
    }
}

/// True when `rest` is nothing but `/:name?` groups.
fn only_optional_params(mut rest: &[u8]) -> bool {
    while !rest.is_empty() {
        let Some(tail) = rest.strip_prefix(b"/:") else {
            return false;
        };
        let name_len = tail.iter().take_while(|&&b| is_name_byte(b)).count();
        match tail.get(name_len) {
            Some(b'?') => rest = &tail[name_len + 1..],
            _ => return false,
        }
    }
    true
}
