//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the AWS SDK backed ECS client,
//! filesystem access and config loading.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod config;
pub mod ecs;
pub mod fs;
