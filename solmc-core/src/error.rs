#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::{Diagnostic, SourceSpan};
use solmc_ast::{NodeId, Span};
use thiserror::Error;

/// Every failure aborts the translation of the whole program.
#[derive(Debug, Error, Diagnostic)]
pub enum TranslateError {
    #[error("unsupported construct: {message}")]
    #[diagnostic(code(solmc::unsupported))]
    Unsupported {
        message: String,
        #[label("no model for this")]
        span: Option<SourceSpan>,
    },

    #[error("no {what} recorded for node {node}")]
    #[diagnostic(
        code(solmc::resolution),
        help("the node was queried before the pass that binds it ran")
    )]
    MissingBinding { node: NodeId, what: &'static str },

    #[error("address space exhausted: all {count} model addresses are in use")]
    #[diagnostic(
        code(solmc::address_space),
        help("raise the address count (`--addresses` or `addresses` in solmc.toml)")
    )]
    AddressExhausted { count: u64 },

    #[error("illegal context: {message}")]
    #[diagnostic(code(solmc::illegal_context))]
    IllegalContext {
        message: String,
        #[label]
        span: Option<SourceSpan>,
    },
}

pub type Result<T> = std::result::Result<T, TranslateError>;

impl TranslateError {
    pub fn unsupported(message: impl Into<String>, span: Span) -> Self {
        TranslateError::Unsupported {
            message: message.into(),
            span: Some(span.into()),
        }
    }

    pub fn unsupported_here(message: impl Into<String>) -> Self {
        TranslateError::Unsupported {
            message: message.into(),
            span: None,
        }
    }

    pub fn missing(node: NodeId, what: &'static str) -> Self {
        TranslateError::MissingBinding { node, what }
    }

    pub fn illegal(message: impl Into<String>, span: Span) -> Self {
        TranslateError::IllegalContext {
            message: message.into(),
            span: Some(span.into()),
        }
    }

    pub fn illegal_here(message: impl Into<String>) -> Self {
        TranslateError::IllegalContext {
            message: message.into(),
            span: None,
        }
    }
}
