//! LMS Server
//!
//! Backend of the e-learning platform. Hosts the permission resolution
//! service: role baselines, per-user overrides and the effective
//! permission view built from both.

pub mod api;
pub mod config;
pub mod db;
pub mod permissions;
