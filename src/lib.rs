//! Vitrine: an in-process static asset cache with pre-compressed variants.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod watch;
