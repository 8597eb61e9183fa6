//! Tests for symbol extraction and substitution

use sasfit_core::expression::{extract_symbols, substitute, SymbolTable};
use std::collections::HashMap;

#[test]
fn test_substitute_identity_mapping() {
    let expr = "2*pi*sin(M1.radius/0.1875) + M1.scale";
    let mapping: HashMap<String, String> = ["M1.radius", "M1.scale"]
        .iter()
        .map(|s| (s.to_string(), s.to_string()))
        .collect();
    assert_eq!(substitute(expr, &mapping), expr);
}

#[test]
fn test_substitute_empty_mapping_leaves_expression() {
    let mapping = HashMap::new();
    for expr in ["", "M1.scale", "2*pi*sin(M1.radius/0.1875) + M1.scale", "  a +  b ** 2  "] {
        assert_eq!(substitute(expr, &mapping), expr);
    }
}

#[test]
fn test_substitute_respects_token_boundaries() {
    let mut mapping = HashMap::new();
    mapping.insert("a".to_string(), "x".to_string());
    assert_eq!(substitute("a + ab + ba + a.b + 2a", &mapping), "x + ab + ba + a.b + 2a");
}

#[test]
fn test_extract_only_registered_names() {
    let table = SymbolTable::new(["M1.scale", "M1.radius", "background"]);
    let symbols = extract_symbols("M1.SCALE * sin(m1.radius) + pi + 1e5", &table);
    let paths: Vec<&str> = symbols.iter().map(|s| s.path()).collect();
    assert_eq!(paths, vec!["M1.radius", "M1.scale"]);
}

#[test]
fn test_aliases_follow_sorted_paths() {
    let table = SymbolTable::new(["b", "A", "c"]);
    let aliases = table.aliases();
    assert_eq!(aliases["A"], "P0");
    assert_eq!(aliases["b"], "P1");
    assert_eq!(aliases["c"], "P2");

    assert_eq!(substitute("A + b*c", &aliases), "P0 + P1*P2");
}
