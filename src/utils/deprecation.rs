//! Deprecation markers for callables.
//!
//! A [`Deprecated`] marker wraps calls to an old function: under
//! [`DeprecationBehavior::Warn`] the first call logs a warning naming the
//! replacement and removal version, under [`DeprecationBehavior::Raise`] every
//! call fails with [`DeprecationError`]. The wrapped result is never touched.

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeprecationBehavior {
    #[default]
    Warn,
    Raise,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DeprecationError {
    pub message: String,
}

#[derive(Debug)]
pub struct Deprecated {
    name: String,
    alternative: Option<String>,
    removed_version: Option<String>,
    behavior: DeprecationBehavior,
    warned: AtomicBool,
}

impl Deprecated {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alternative: None,
            removed_version: None,
            behavior: DeprecationBehavior::default(),
            warned: AtomicBool::new(false),
        }
    }

    /// Name the function callers should use instead.
    pub fn with_alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternative = Some(alternative.into());
        self
    }

    /// Version in which the function goes away.
    pub fn removed_in(mut self, version: impl Into<String>) -> Self {
        self.removed_version = Some(version.into());
        self
    }

    pub fn with_behavior(mut self, behavior: DeprecationBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn alternative_note(&self) -> String {
        self.alternative
            .as_ref()
            .map(|alt| format!(" Use ``{}`` instead.", alt))
            .unwrap_or_default()
    }

    /// The warning text, e.g.
    /// "Function ``old`` is deprecated and will be removed in version 2.0. Use ``new`` instead."
    pub fn message(&self) -> String {
        let removal = self
            .removed_version
            .as_ref()
            .map(|v| format!(" and will be removed in version {}", v))
            .unwrap_or_default();
        format!(
            "Function ``{}`` is deprecated{}.{}",
            self.name,
            removal,
            self.alternative_note()
        )
    }

    /// Prefix for the deprecated function's documentation.
    pub fn doc_note(&self) -> String {
        format!("**Deprecated function**.{}", self.alternative_note())
    }

    pub fn has_warned(&self) -> bool {
        self.warned.load(Ordering::SeqCst)
    }

    /// Invoke `f` through the marker.
    pub fn call<R>(&self, f: impl FnOnce() -> R) -> Result<R, DeprecationError> {
        match self.behavior {
            DeprecationBehavior::Warn => {
                if !self.warned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(function = %self.name, "{}", self.message());
                }
            }
            DeprecationBehavior::Raise => {
                return Err(DeprecationError {
                    message: self.message(),
                });
            }
        }
        Ok(f())
    }
}
