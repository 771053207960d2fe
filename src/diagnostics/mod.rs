use crate::span::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// A suspend keyword appeared somewhere it is not allowed.
    #[error("Coroutine context error: {msg}")]
    Context { msg: String, span: Span },

    /// Promise or handle type resolution failed for a coroutine.
    #[error("Coroutine resolution error: {msg}")]
    Resolve { msg: String, span: Span },

    /// The awaitable or promise lacks a required member, or a built call
    /// has the wrong shape.
    #[error("Awaitable error: {msg}")]
    Awaitable { msg: String, span: Span },

    /// Invariant violation inside the lowering pipeline itself.
    #[error("Lowering error: {msg}")]
    Lowering { msg: String },
}

impl CompileError {
    pub fn context(msg: impl Into<String>, span: Span) -> Self {
        Self::Context { msg: msg.into(), span }
    }

    pub fn resolve(msg: impl Into<String>, span: Span) -> Self {
        Self::Resolve { msg: msg.into(), span }
    }

    pub fn awaitable(msg: impl Into<String>, span: Span) -> Self {
        Self::Awaitable { msg: msg.into(), span }
    }

    pub fn lowering(msg: impl Into<String>) -> Self {
        Self::Lowering { msg: msg.into() }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Context { span, .. }
            | Self::Resolve { span, .. }
            | Self::Awaitable { span, .. } => Some(*span),
            Self::Lowering { .. } => None,
        }
    }
}

/// Non-fatal diagnostic recorded during lowering (the pipeline continues).
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub msg: String,
    pub span: Span,
}

impl Warning {
    pub fn new(msg: impl Into<String>, span: Span) -> Self {
        Self { msg: msg.into(), span }
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, _filename: &str, err: &CompileError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match err.span() {
        Some(span) => {
            let kind_str = match err {
                CompileError::Context { .. } => "coroutine context",
                CompileError::Resolve { .. } => "coroutine resolution",
                CompileError::Awaitable { .. } => "awaitable",
                CompileError::Lowering { .. } => unreachable!(),
            };
            let msg = err.to_string();
            Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("{kind_str} error"))
                .with_label(
                    Label::new(span.start..span.end)
                        .with_message(&msg),
                )
                .finish()
                .eprint(Source::from(source))
                .ok();
        }
        None => {
            eprintln!("error: {err}");
        }
    }
}
