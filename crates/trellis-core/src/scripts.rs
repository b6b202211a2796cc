//! Server-side script repository
//!
//! Gremlin/Groovy source files hold one method per `def`. A method starts
//! with `def name(params) {` at column 0 and runs to the next line that is
//! exactly `}` at column 0. Methods are kept by name inside a namespace.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, TrellisError};

/// One parsed server-side method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub params: Vec<String>,
    /// Method body without the enclosing `def` line and closing brace
    pub body: String,
}

/// Methods of one namespace, keyed by method name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    namespace: String,
    methods: BTreeMap<String, Script>,
}

impl Scripts {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            methods: BTreeMap::new(),
        }
    }

    /// Parse every method in `source`
    pub fn parse(namespace: impl Into<String>, source: &str) -> Result<Self> {
        let mut scripts = Self::new(namespace);
        scripts.update(source)?;
        Ok(scripts)
    }

    /// Load a script file
    pub fn from_file(namespace: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            TrellisError::Config(format!("failed to read scripts {}: {e}", path.display()))
        })?;
        Self::parse(namespace, &source)
    }

    /// Parse `source` and add its methods, replacing same-named ones
    pub fn update(&mut self, source: &str) -> Result<()> {
        let mut current: Option<(String, Vec<String>, Vec<&str>)> = None;

        for (lineno, line) in source.lines().enumerate() {
            match current.as_mut() {
                None => {
                    if let Some(rest) = line.strip_prefix("def ") {
                        let (name, params) = parse_signature(rest).ok_or_else(|| {
                            TrellisError::InvalidInput(format!(
                                "{}:{}: malformed method signature",
                                self.namespace,
                                lineno + 1
                            ))
                        })?;
                        current = Some((name, params, Vec::new()));
                    }
                }
                Some((_, _, body)) => {
                    if line.trim_end() == "}" && !line.starts_with(char::is_whitespace) {
                        if let Some((name, params, body)) = current.take() {
                            self.methods.insert(
                                name.clone(),
                                Script {
                                    name,
                                    params,
                                    body: dedent(&body),
                                },
                            );
                        }
                    } else {
                        body.push(line);
                    }
                }
            }
        }

        if let Some((name, _, _)) = current {
            return Err(TrellisError::InvalidInput(format!(
                "{}: method '{name}' is not closed",
                self.namespace
            )));
        }
        Ok(())
    }

    /// Add a single method, replacing one with the same name
    pub fn insert(&mut self, script: Script) {
        self.methods.insert(script.name.clone(), script);
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Body of the named method
    pub fn get(&self, name: &str) -> Result<&str> {
        self.method(name).map(|script| script.body.as_str())
    }

    pub fn method(&self, name: &str) -> Result<&Script> {
        self.methods.get(name).ok_or_else(|| {
            TrellisError::NotFound(format!("script '{}:{name}'", self.namespace))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// `name(a, b) {` -> ("name", ["a", "b"])
fn parse_signature(rest: &str) -> Option<(String, Vec<String>)> {
    let rest = rest.trim_end();
    let rest = rest.strip_suffix('{')?.trim_end();
    let open = rest.find('(')?;
    let close = rest.rfind(')')?;
    if close < open || close != rest.len() - 1 {
        return None;
    }
    let name = rest[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let params = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Some((name.to_string(), params))
}

/// Strip the common leading indentation
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
