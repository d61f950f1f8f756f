//! Unified error model
//!
//! Every crate in the workspace either returns [`VxError`] directly or
//! provides a `From` conversion into it.

use std::error::Error;
use std::fmt;

use crate::config::ConfigError;

/// Result alias used across the workspace.
pub type VxResult<T> = Result<T, VxError>;

/// Top level error for the VX layer.
#[derive(Debug, Clone)]
pub enum VxError {
    /// Core failures shared by all crates
    Core(CoreError),
    /// Configuration loading or validation failed
    Config(ConfigError),
    /// IO failure, stored as text so the error stays `Clone`
    Io(String),
    /// Error wrapped with caller supplied context
    WithContext {
        error: Box<VxError>,
        context: String,
    },
    /// Several independent failures
    Multiple(Vec<VxError>),
}

/// Core failures.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A feature or variant is not supported
    NotSupported {
        feature: String,
        module: String,
    },
    /// A caller supplied parameter is invalid
    InvalidParameter {
        name: String,
        value: String,
        message: String,
    },
    /// Invalid or inconsistent configuration
    InvalidConfig {
        message: String,
        field: String,
    },
    /// Internal invariant broken
    Internal {
        message: String,
        module: String,
    },
}

impl fmt::Display for VxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VxError::Core(e) => write!(f, "Core error: {}", e),
            VxError::Config(e) => write!(f, "Config error: {}", e),
            VxError::Io(e) => write!(f, "IO error: {}", e),
            VxError::WithContext { error, context } => write!(f, "{}: {}", context, error),
            VxError::Multiple(errors) => {
                writeln!(f, "Multiple errors occurred:")?;
                for (i, e) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, e)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotSupported { feature, module } => {
                write!(f, "Feature '{}' not supported in {}", feature, module)
            }
            CoreError::InvalidParameter {
                name,
                value,
                message,
            } => write!(f, "Invalid parameter '{}'='{}': {}", name, value, message),
            CoreError::InvalidConfig { message, field } => {
                write!(f, "Invalid configuration: {} (field: {})", message, field)
            }
            CoreError::Internal { message, module } => {
                write!(f, "Internal error in {}: {}", module, message)
            }
        }
    }
}

impl Error for VxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VxError::Core(e) => Some(e),
            VxError::Config(e) => Some(e),
            VxError::Io(_) => None,
            VxError::WithContext { error, .. } => Some(error.as_ref()),
            VxError::Multiple(_) => None,
        }
    }
}

impl Error for CoreError {}

impl PartialEq for VxError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VxError::Core(a), VxError::Core(b)) => a == b,
            (VxError::Config(a), VxError::Config(b)) => a.to_string() == b.to_string(),
            (VxError::Io(a), VxError::Io(b)) => a == b,
            (
                VxError::WithContext {
                    error: a,
                    context: ca,
                },
                VxError::WithContext {
                    error: b,
                    context: cb,
                },
            ) => a == b && ca == cb,
            (VxError::Multiple(a), VxError::Multiple(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<CoreError> for VxError {
    fn from(e: CoreError) -> Self {
        VxError::Core(e)
    }
}

impl From<ConfigError> for VxError {
    fn from(e: ConfigError) -> Self {
        VxError::Config(e)
    }
}

impl From<std::io::Error> for VxError {
    fn from(e: std::io::Error) -> Self {
        VxError::Io(e.to_string())
    }
}

// ============================================================================
// Error Context Trait
// ============================================================================

/// Attach context to any error convertible into [`VxError`].
pub trait ErrorContext<T> {
    fn context(self, ctx: &str) -> Result<T, VxError>;

    fn with_context<F, S>(self, f: F) -> Result<T, VxError>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<VxError>,
{
    fn context(self, ctx: &str) -> Result<T, VxError> {
        self.map_err(|e| VxError::WithContext {
            error: Box::new(e.into()),
            context: ctx.to_string(),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T, VxError>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| VxError::WithContext {
            error: Box::new(e.into()),
            context: f().into(),
        })
    }
}

/// Writes errors and their source chain through the `log` facade.
pub struct ErrorLogger;

impl ErrorLogger {
    /// Maximum depth of the source chain that gets logged.
    const MAX_CHAIN: usize = 10;

    pub fn log_error(error: &VxError) {
        log::error!("VX error: {}", error);

        let mut source = error.source();
        let mut depth = 1;
        while let Some(err) = source {
            log::error!("  caused by ({}): {}", depth, err);
            source = err.source();
            depth += 1;
            if depth > Self::MAX_CHAIN {
                break;
            }
        }
    }

    pub fn log_warning(error: &VxError) {
        log::warn!("VX warning: {}", error);
    }

    pub fn log_debug(error: &VxError) {
        log::debug!("VX debug: {}", error);
    }
}
