//! Integration tests for ecs-rollout
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! They never reach a real cluster.
