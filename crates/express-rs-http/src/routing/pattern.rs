//! Path pattern compilation and matching.
//!
//! [`CompiledPattern`] turns an Express-style path (`/user/:id`) into an
//! anchored [`Regex`] plus the ordered list of [`PathKey`]s it captures.
//!
//! ## Syntax
//!
//! | Form | Meaning |
//! |---|---|
//! | `:name` | one segment, up to the next `/` |
//! | `:name?` | optional segment (the preceding `/` becomes optional too) |
//! | `:name(\d+)` | segment restricted to a custom regex |
//! | `:name*` | segment plus anything after it |
//! | `.:format` | extension; captures up to the next `/` or `.` |
//! | `*` | unnamed catch-all; consumes a group but adds no key |
//!
//! Every other character is matched literally. A list of patterns compiles to
//! an alternation; a pre-built [`Regex`] is used as-is and captures no keys.

use std::fmt;

use regex::{Regex, RegexBuilder};

use express_rs_core::{ExpressError, ExpressResult};

/// A named capture in a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    /// The parameter name, without the leading `:`.
    pub name: String,
    /// Whether the segment was marked optional with `?`.
    pub optional: bool,
}

/// Flags controlling how a pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    /// Match case-sensitively.
    pub case_sensitive: bool,
    /// Treat a trailing `/` as significant.
    pub strict: bool,
    /// Anchor the pattern at the end of the path. Prefix patterns (mount
    /// points) leave this off.
    pub end: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict: false,
            end: true,
        }
    }
}

impl PatternOptions {
    /// Options for a mount point: non-strict, matching a path prefix.
    pub const fn prefix(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            strict: false,
            end: false,
        }
    }

    /// Options for a route endpoint: end-anchored.
    pub const fn route(case_sensitive: bool, strict: bool) -> Self {
        Self {
            case_sensitive,
            strict,
            end: true,
        }
    }
}

/// What a layer is registered on: a path string, a regex, or several of either.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// An Express-style path such as `/users/:id`.
    Literal(String),
    /// A regex used unchanged.
    Regex(Regex),
    /// Any of the given specs.
    List(Vec<PathSpec>),
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        Self::Literal(path.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        Self::Literal(path)
    }
}

impl From<&String> for PathSpec {
    fn from(path: &String) -> Self {
        Self::Literal(path.clone())
    }
}

impl From<Regex> for PathSpec {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl<T: Into<Self>> From<Vec<T>> for PathSpec {
    fn from(specs: Vec<T>) -> Self {
        Self::List(specs.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(path) => f.write_str(path),
            Self::Regex(regex) => f.write_str(regex.as_str()),
            Self::List(specs) => {
                for (i, spec) in specs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{spec}")?;
                }
                Ok(())
            }
        }
    }
}

/// A successful match: the matched prefix and the raw (undecoded) captures,
/// aligned with [`CompiledPattern::keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch<'p> {
    /// The portion of the path the pattern consumed.
    pub matched: &'p str,
    /// One entry per key; `None` when the group did not participate.
    pub captures: Vec<Option<&'p str>>,
}

#[derive(Clone)]
enum Matcher {
    /// `/` as a prefix: matches every path with an empty prefix.
    FastSlash,
    Regex(Regex),
}

/// A compiled path pattern.
///
/// # Examples
///
/// ```
/// use express_rs_http::routing::{CompiledPattern, PatternOptions};
///
/// let pattern = CompiledPattern::compile(&"/user/:id".into(), PatternOptions::default()).unwrap();
/// let m = pattern.matches("/user/42").unwrap();
/// assert_eq!(m.matched, "/user/42");
/// assert_eq!(m.captures, vec![Some("42")]);
/// assert!(pattern.matches("/user/42/posts").is_none());
/// ```
#[derive(Clone)]
pub struct CompiledPattern {
    matcher: Matcher,
    keys: Vec<PathKey>,
    key_groups: Vec<String>,
    terminators: Vec<String>,
    options: PatternOptions,
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.matcher {
            Matcher::FastSlash => "<fast slash>",
            Matcher::Regex(regex) => regex.as_str(),
        };
        f.debug_struct("CompiledPattern")
            .field("regex", &source)
            .field("keys", &self.keys)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CompiledPattern {
    /// Compiles a path spec.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::InvalidPattern`] if a custom capture group is
    /// unbalanced or the resulting regex does not compile.
    pub fn compile(spec: &PathSpec, options: PatternOptions) -> ExpressResult<Self> {
        match spec {
            PathSpec::Literal(path) if path == "/" && !options.end => {
                return Ok(Self::fast_slash(options.case_sensitive));
            }
            PathSpec::Regex(regex) => {
                return Ok(Self {
                    matcher: Matcher::Regex(regex.clone()),
                    keys: Vec::new(),
                    key_groups: Vec::new(),
                    terminators: Vec::new(),
                    options,
                });
            }
            _ => {}
        }

        let mut compiler = Compiler::new(options);
        let source = compiler.source(spec)?;
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| ExpressError::InvalidPattern {
                pattern: spec.to_string(),
                reason: e.to_string(),
            })?;

        let key_groups = (0..compiler.keys.len()).map(key_group).collect();
        Ok(Self {
            matcher: Matcher::Regex(regex),
            keys: compiler.keys,
            key_groups,
            terminators: compiler.terminators,
            options,
        })
    }

    /// The `/` prefix pattern that matches everything.
    pub fn fast_slash(case_sensitive: bool) -> Self {
        Self {
            matcher: Matcher::FastSlash,
            keys: Vec::new(),
            key_groups: Vec::new(),
            terminators: Vec::new(),
            options: PatternOptions::prefix(case_sensitive),
        }
    }

    /// Returns `true` for the match-everything `/` prefix pattern.
    pub const fn is_fast_slash(&self) -> bool {
        matches!(self.matcher, Matcher::FastSlash)
    }

    /// Returns the keys in capture order.
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Returns the options this pattern was compiled with.
    pub const fn options(&self) -> PatternOptions {
        self.options
    }

    /// Returns the regex source, or `None` for the fast-slash pattern.
    pub fn source(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::FastSlash => None,
            Matcher::Regex(regex) => Some(regex.as_str()),
        }
    }

    /// Matches a path, returning the consumed prefix and raw captures.
    pub fn matches<'p>(&self, path: &'p str) -> Option<PatternMatch<'p>> {
        let regex = match &self.matcher {
            Matcher::FastSlash => {
                return Some(PatternMatch {
                    matched: "",
                    captures: Vec::new(),
                })
            }
            Matcher::Regex(regex) => regex,
        };

        let caps = regex.captures(path)?;
        let whole = caps.get(0)?;
        // A prefix pattern consumes the `/` that ends it; the prefix stops before it.
        let end = self
            .terminators
            .iter()
            .find_map(|name| caps.name(name))
            .map_or(whole.end(), |m| m.start());

        let captures = self
            .key_groups
            .iter()
            .map(|group| caps.name(group).map(|m| m.as_str()))
            .collect();

        Some(PatternMatch {
            matched: &path[whole.start()..end],
            captures,
        })
    }
}

fn key_group(index: usize) -> String {
    format!("__k{index}")
}

const fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Accumulates keys and terminator groups while building one regex source.
struct Compiler {
    options: PatternOptions,
    keys: Vec<PathKey>,
    terminators: Vec<String>,
}

impl Compiler {
    const fn new(options: PatternOptions) -> Self {
        Self {
            options,
            keys: Vec::new(),
            terminators: Vec::new(),
        }
    }

    fn source(&mut self, spec: &PathSpec) -> ExpressResult<String> {
        match spec {
            PathSpec::Literal(path) => self.literal(path),
            PathSpec::Regex(regex) => Ok(regex.as_str().to_string()),
            PathSpec::List(specs) => {
                let parts = specs
                    .iter()
                    .map(|s| self.source(s))
                    .collect::<ExpressResult<Vec<_>>>()?;
                Ok(format!("(?:{})", parts.join("|")))
            }
        }
    }

    fn literal(&mut self, path: &str) -> ExpressResult<String> {
        let body = if self.options.strict {
            path
        } else {
            path.strip_suffix('/').unwrap_or(path)
        };

        let chars: Vec<char> = body.chars().collect();
        let mut out = String::from("^");
        let mut pending = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == ':' && chars.get(i + 1).copied().is_some_and(is_word) {
                let start = i + 1;
                let mut j = start;
                while chars.get(j).copied().is_some_and(is_word) {
                    j += 1;
                }
                let name: String = chars[start..j].iter().collect();

                let capture = if chars.get(j) == Some(&'(') {
                    let (capture, next) =
                        custom_capture(&chars, j).ok_or_else(|| ExpressError::InvalidPattern {
                            pattern: path.to_string(),
                            reason: format!("unclosed capture group for ':{name}'"),
                        })?;
                    j = next;
                    Some(capture)
                } else {
                    None
                };
                let star = chars.get(j) == Some(&'*');
                if star {
                    j += 1;
                }
                let optional = chars.get(j) == Some(&'?');
                if optional {
                    j += 1;
                }

                let format = pending.ends_with('.');
                if format {
                    pending.pop();
                }
                let slash = pending.ends_with('/');
                if slash {
                    pending.pop();
                }
                out.push_str(&regex::escape(&pending));
                pending.clear();

                let token = self.token(name, capture, slash, format, star, optional);
                out.push_str(&token);
                i = j;
            } else if c == '*' {
                out.push_str(&regex::escape(&pending));
                pending.clear();
                out.push_str("(.*)");
                i += 1;
            } else {
                pending.push(c);
                i += 1;
            }
        }
        out.push_str(&regex::escape(&pending));

        if !self.options.strict {
            out.push_str("/?");
        }

        if self.options.end {
            out.push('$');
        } else if !out.ends_with('/') {
            let name = format!("__end{}", self.terminators.len());
            out.push_str(&format!("(?P<{name}>/|$)"));
            self.terminators.push(name);
        }
        Ok(out)
    }

    fn token(
        &mut self,
        name: String,
        capture: Option<String>,
        slash: bool,
        format: bool,
        star: bool,
        optional: bool,
    ) -> String {
        let group = key_group(self.keys.len());
        self.keys.push(PathKey { name, optional });

        let slash = if slash { "/" } else { "" };
        let (format, format_class) = if format { (r"\.", ".") } else { ("", "") };
        let capture = capture.unwrap_or_else(|| format!("[^/{format_class}]+?"));
        let rest = if star {
            format!("((?:[/{format_class}].+?)?)")
        } else {
            String::new()
        };

        if optional {
            format!("(?:{format}{slash}(?P<{group}>{capture}){rest})?")
        } else {
            format!("{slash}(?:{format}(?P<{group}>{capture}){rest})")
        }
    }
}

/// Reads a parenthesized capture starting at `open`, returning its inner source
/// and the index after the closing paren.
fn custom_capture(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((chars[open + 1..i].iter().collect(), i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
