//! Guardian - subscription-gated PC diagnostic service
//!
//! This library provides the licensing core of the Guardian system: license
//! code issuance, device binding, expiry enforcement, renewal, usage
//! accounting, and the HTTP handlers exposing those operations. The scan
//! engine that produces diagnostic reports is an external collaborator
//! behind the [`scan::ScanEngine`] trait.

pub mod code;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod license;
pub mod models;
pub mod scan;
