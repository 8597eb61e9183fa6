//! Integration tests for the expression resolver
//!
//! These tests run constraint expressions against a registry the way a host
//! application would.

// Building and applying evaluators
mod evaluator_tests;

// Symbol extraction and substitution
mod symbol_tests;
