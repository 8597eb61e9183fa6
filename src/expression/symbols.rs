//! Symbol extraction and textual substitution
//!
//! A symbol is a token of the form `[A-Za-z][A-Za-z0-9_.]*` that names a
//! registered parameter. Each registered parameter gets a stable short alias
//! (`P0`, `P1`, ...) assigned from its position in the case-insensitively
//! sorted list of names.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

use crate::parameters::registry::{canonical, ParameterRegistry};

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9_.]*").expect("symbol pattern is valid"))
}

/// Name tokens of `expr`
fn tokens(expr: &str) -> impl Iterator<Item = regex::Match<'_>> {
    symbol_pattern().find_iter(expr).filter(move |token| {
        // A match starting inside a number (`1e5`) or after `_` is not a token
        !expr[..token.start()]
            .chars()
            .next_back()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    })
}

/// A registered parameter referenced by an expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    index: usize,
    path: String,
}

impl Symbol {
    /// Position in the symbol table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Parameter path as registered
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Short alias used in compiled code
    pub fn alias(&self) -> String {
        format!("P{}", self.index)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// The set of registered parameter names, with their aliases
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_key: HashMap<String, usize>,
}

impl SymbolTable {
    /// Build a table from parameter paths
    ///
    /// Paths are sorted case-insensitively; a path repeated in another case is
    /// registered once.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut seen = BTreeSet::new();
        for path in paths {
            let path = path.as_ref().trim();
            let key = canonical(path);
            if !key.is_empty() && seen.insert(key.clone()) {
                entries.push((key, path.to_string()));
            }
        }
        entries.sort();

        let mut table = Self::default();
        for (index, (key, path)) in entries.into_iter().enumerate() {
            table.by_key.insert(key, index);
            table.symbols.push(Symbol { index, path });
        }
        table
    }

    /// Build a table from every parameter a registry exposes
    pub fn from_registry<R: ParameterRegistry + ?Sized>(registry: &R) -> Self {
        Self::new(registry.param_names())
    }

    /// Find the symbol for a parameter name, case-insensitively
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.by_key.get(&canonical(name)).map(|&i| &self.symbols[i])
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Path-to-alias map, as used to rewrite compiled code
    pub fn aliases(&self) -> HashMap<String, String> {
        self.symbols
            .iter()
            .map(|s| (s.path.clone(), s.alias()))
            .collect()
    }
}

/// Registered parameters referenced by `expr`
///
/// Tokens that are not registered names (constants, function names) are
/// ignored. The result is empty for a constant expression.
///
/// # Examples
///
/// ```
/// use sasfit_core::expression::{extract_symbols, SymbolTable};
///
/// let table = SymbolTable::new(["G0.sigma", "M1.G1", "other"]);
/// let symbols = extract_symbols("2*pi*sin(G0.sigma/.1875) + M1.G1", &table);
/// let paths: Vec<_> = symbols.iter().map(|s| s.path()).collect();
/// assert_eq!(paths, vec!["G0.sigma", "M1.G1"]);
/// ```
pub fn extract_symbols(expr: &str, table: &SymbolTable) -> BTreeSet<Symbol> {
    tokens(expr)
        .filter_map(|token| table.lookup(token.as_str()).cloned())
        .collect()
}

/// Replace whole tokens of `expr` found in `mapping`
///
/// Only complete tokens are replaced: with `a.b -> P0`, `a.bc` and `xa.b`
/// are left alone.
pub fn substitute(expr: &str, mapping: &HashMap<String, String>) -> String {
    substitute_with(expr, |token| mapping.get(token).cloned())
}

/// Replace whole tokens of `expr` for which `replace` returns a value
pub fn substitute_with<F>(expr: &str, mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(expr.len());
    let mut last = 0;
    for token in tokens(expr) {
        if let Some(replacement) = replace(token.as_str()) {
            out.push_str(&expr[last..token.start()]);
            out.push_str(&replacement);
            last = token.end();
        }
    }
    out.push_str(&expr[last..]);
    out
}
