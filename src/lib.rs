#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![doc = include_str!("../README.md")]

pub mod boot;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod logger;
pub mod normalization;
pub mod ontology;

pub use errors::{Error, Result};
