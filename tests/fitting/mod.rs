//! Integration tests for the fit engine
//!
//! These tests fit synthetic scattering-like data the way the host
//! application drives the engine.

// Direct fits through FitEngine
mod engine_tests;

// Fits running on the background worker
mod thread_tests;
