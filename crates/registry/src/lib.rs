//! # TrialScout Registry
//!
//! The search side of TrialScout: a patient description becomes validated
//! registry parameters ([`ParameterExtractor`]), and those parameters become
//! study records ([`RegistryClient`]), following pagination to the end.

pub mod client;
pub mod extractor;
pub mod params;

pub use client::RegistryClient;
pub use extractor::ParameterExtractor;
pub use params::{ParamKind, ParamValue, SearchParams};
