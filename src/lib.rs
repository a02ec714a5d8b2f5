//! Vitrine: query result cache and request coalescer for a multi-tenant
//! CMS and booking front end.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
