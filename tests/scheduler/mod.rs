//! Integration tests for the background worker

// Queue, requeue, reset and stop
mod queue_tests;

// Progress pacing and cancellation checkpoints
mod update_tests;
