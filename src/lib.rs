//! PostPilot query caching: a two-tier result cache in front of the
//! dashboard's read queries, with tag/event invalidation and warm-up tooling.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
