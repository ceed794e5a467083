//! miette rendering of compile failures and code generation warnings.
//!
//! Every item shown to the user is a [`Reportable`]: a diagnostic together
//! with the playbook it points into, or a failure without a location (I/O,
//! configuration, build). Each diagnostic of a failed stage is rendered on
//! its own.

use std::fmt;

use miette::{GraphicalReportHandler, LabeledSpan, SourceCode, SourceSpan};

use bosun::{BosunError, Generated, codegen::rust::INVALID_IDENTIFIER};
use bosun_parser::error::{Diagnostic, ErrorCode, Severity};

/// One message for the user.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A diagnostic and the playbook source it was found in.
    Diagnostic { diag: &'a Diagnostic, src: &'a str },
    /// A failure without a source location.
    Error(&'a BosunError),
}

impl<'a> Reportable<'a> {
    /// Everything `err` has to report: each of its diagnostics, or the
    /// error itself.
    pub fn from_error(err: &'a BosunError) -> Vec<Self> {
        match err {
            BosunError::Parse { err, src } => err
                .diagnostics()
                .iter()
                .map(|diag| Reportable::Diagnostic { diag, src })
                .collect(),
            other => vec![Reportable::Error(other)],
        }
    }

    /// The unresolved-name warnings of a generated program.
    pub fn warnings(generated: &'a Generated, src: &'a str) -> impl Iterator<Item = Self> {
        generated
            .diagnostics
            .iter()
            .map(move |diag| Reportable::Diagnostic { diag, src })
    }

    /// Render with miette's graphical handler, falling back to the plain
    /// message.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match GraphicalReportHandler::new().render_report(&mut out, self) {
            Ok(()) => out,
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic { diag, .. } => f.write_str(diag.message()),
            Reportable::Error(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic { .. } => None,
            Reportable::Error(err) => err.source(),
        }
    }
}

impl miette::Diagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic { diag, .. } => {
                diag.code().map(|code| Box::new(code) as Box<dyn fmt::Display>)
            }
            Reportable::Error(err) => {
                error_code(err).map(|code| Box::new(code) as Box<dyn fmt::Display>)
            }
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        let Reportable::Diagnostic { diag, .. } = self else {
            return Some(miette::Severity::Error);
        };
        Some(match diag.severity() {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            Reportable::Diagnostic { diag, .. } if diag.code() == Some(ErrorCode::E400) => {
                let note = format!(
                    "the generated source has `{INVALID_IDENTIFIER}` in its place and will not build"
                );
                Some(match diag.help() {
                    Some(help) => format!("{help}\n{note}"),
                    None => note,
                })
            }
            Reportable::Diagnostic { diag, .. } => diag.help().map(str::to_string),
            Reportable::Error(BosunError::Build(_)) => Some(
                "the generated source is kept next to the output; rerun with --no-build to inspect it"
                    .to_string(),
            ),
            Reportable::Error(_) => None,
        };
        help.map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            Reportable::Diagnostic { src, .. } => Some(src as &dyn SourceCode),
            Reportable::Error(_) => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let Reportable::Diagnostic { diag, .. } = self else {
            return None;
        };
        if diag.labels().is_empty() {
            return None;
        }

        Some(Box::new(diag.labels().iter().enumerate().map(|(i, label)| {
            let span = SourceSpan::new(label.span.start().into(), label.span.len());
            let message = Some(label.message.clone());
            if i == 0 {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            }
        })))
    }
}

fn error_code(err: &BosunError) -> Option<&'static str> {
    match err {
        BosunError::Io(_) => Some("bosun::io"),
        BosunError::Parse { .. } => None,
        BosunError::Config(_) => Some("bosun::config"),
        BosunError::Build(_) => Some("bosun::build"),
    }
}
