//! The route table and its configuration-line grammar.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::backend::BackendKind;
use crate::parser::Method;
use crate::router::error::RouteError;
use crate::router::matcher::{is_name_byte, match_path, MatchResult, MAX_PARAMS};

/// Which request methods a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFilter {
    /// `*` in the configuration.
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn allows(&self, method: Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(allowed) => *allowed == method,
        }
    }
}

impl FromStr for MethodFilter {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(MethodFilter::Any);
        }
        Method::from_str(s)
            .map(MethodFilter::Only)
            .map_err(|_| RouteError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("*"),
            MethodFilter::Only(method) => write!(f, "{method}"),
        }
    }
}

/// The `<type>` token of a route line.
///
/// Several types share a backend: every embedded-script type runs on the one
/// scripting engine, and each CGI type names the interpreter binary to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Lua,
    Python,
    Node,
    Rhai,
    Php,
    Ruby,
    Cmod,
    Sqlite,
    Forward,
    Static,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Lua => "lua",
            RouteType::Python => "python",
            RouteType::Node => "node",
            RouteType::Rhai => "rhai",
            RouteType::Php => "php",
            RouteType::Ruby => "ruby",
            RouteType::Cmod => "cmod",
            RouteType::Sqlite => "sqlite",
            RouteType::Forward => "forward",
            RouteType::Static => "static",
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            RouteType::Lua | RouteType::Python | RouteType::Node | RouteType::Rhai => BackendKind::ScriptingEngine,
            RouteType::Php | RouteType::Ruby => BackendKind::Subprocess,
            RouteType::Cmod => BackendKind::NativeModule,
            RouteType::Sqlite => BackendKind::Database,
            RouteType::Forward => BackendKind::Forward,
            RouteType::Static => BackendKind::Static,
        }
    }
}

impl FromStr for RouteType {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lua" => Ok(RouteType::Lua),
            "python" => Ok(RouteType::Python),
            "node" => Ok(RouteType::Node),
            "rhai" => Ok(RouteType::Rhai),
            "php" => Ok(RouteType::Php),
            "ruby" => Ok(RouteType::Ruby),
            "cmod" => Ok(RouteType::Cmod),
            "sqlite" => Ok(RouteType::Sqlite),
            "forward" => Ok(RouteType::Forward),
            "static" => Ok(RouteType::Static),
            _ => Err(RouteError::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured mapping from a path pattern to a backend target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: MethodFilter,
    pub pattern: String,
    pub route_type: RouteType,
    pub target: String,
}

impl Route {
    /// Create a route, rejecting malformed patterns.
    pub fn new(
        method: MethodFilter,
        pattern: impl Into<String>,
        route_type: RouteType,
        target: impl Into<String>,
    ) -> Result<Self, RouteError> {
        let pattern = pattern.into();
        validate_pattern(&pattern)?;

        Ok(Self {
            method,
            pattern,
            route_type,
            target: target.into(),
        })
    }

    /// Parse `route <METHOD|*> <pattern> <type> <target>`.
    pub fn parse_line(line: &str) -> Result<Self, RouteError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["route", method, pattern, route_type, target] => Route::new(
                method.parse()?,
                *pattern,
                route_type.parse()?,
                *target,
            ),
            _ => Err(RouteError::MalformedLine(line.trim().to_string())),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.route_type.backend()
    }

    /// Match this route against a request.
    pub fn matches(&self, method: Method, path: &str) -> Option<MatchResult> {
        if !self.method.allows(method) {
            return None;
        }
        let result = match_path(&self.pattern, path);
        result.matched.then_some(result)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {} {}", self.method, self.pattern, self.route_type, self.target)
    }
}

fn validate_pattern(pattern: &str) -> Result<(), RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    if let Some(star) = pattern.find('*') {
        let rest = &pattern[star + 1..];
        if rest.contains('*') {
            return Err(invalid("at most one wildcard is allowed"));
        }
        if rest.contains('/') || rest.contains(':') {
            return Err(invalid("the wildcard must be in the final segment"));
        }
    }

    let bytes = pattern.as_bytes();
    let mut names = HashSet::new();
    for (i, _) in pattern.match_indices(':') {
        let name_len = bytes[i + 1..].iter().take_while(|&&b| is_name_byte(b)).count();
        if name_len == 0 {
            return Err(invalid("parameter name is empty"));
        }
        let name = &pattern[i + 1..i + 1 + name_len];
        if !names.insert(name) {
            return Err(invalid("parameter names must be unique"));
        }
    }

    if names.len() > MAX_PARAMS {
        return Err(invalid("too many parameters"));
    }

    Ok(())
}

/// Routes in declaration order. The first route that matches wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Find the first route accepting `method` whose pattern matches `path`.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Route, MatchResult)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(method, path).map(|result| (route, result)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
