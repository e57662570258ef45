use std::ops::Range;
use std::path::PathBuf;

/// Source information for where a diagnostic came from
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warning messages that don't prevent config loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig { file_path: PathBuf },
}

/// Error messages that indicate problems with the config
#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
}

/// Error type for merge conflicts
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub message: String,
    pub conflicts: Vec<MergeConflictLocation>,
}

#[derive(Debug, Clone)]
pub struct MergeConflictLocation {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

/// Error type for validation failures
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    pub span: Option<Range<usize>>,
    pub source: Option<SourceInfo>,
}

/// Error type for config loading failures (parse errors, IO errors, etc.)
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read '{}': {error}", path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to parse '{}': {error}", path.display())]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },

    #[error("Import cycle detected at '{}': involves {} file(s)", path.display(), cycle.len())]
    ImportCycle { path: PathBuf, cycle: Vec<PathBuf> },
}

impl Diagnostic {
    /// Returns true if this diagnostic is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    /// Returns true if this diagnostic is a warning
    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

/// Format all diagnostics for display using Ariadne
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut output = Vec::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(Warning::EmptyConfig { file_path }) => {
                let warning_msg = format!(
                    "Warning: Config file '{}' is empty and has no effect\n",
                    file_path.display()
                );
                output.extend_from_slice(warning_msg.as_bytes());
            }
            Diagnostic::Error(Error::Merge(merge_error)) => {
                write_merge_error(merge_error, &mut output);
            }
            Diagnostic::Error(Error::Validation(validation_error)) => {
                write_validation_error(validation_error, &mut output);
            }
        }
    }

    String::from_utf8_lossy(&output).to_string()
}

fn write_merge_error(merge_error: &MergeError, output: &mut Vec<u8>) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let Some(first_conflict) = merge_error.conflicts.first() else {
        let msg = format!(
            "Merge conflict in field '{}': {}\n",
            merge_error.field_path, merge_error.message
        );
        output.extend_from_slice(msg.as_bytes());
        return;
    };

    let mut report = Report::build(
        ReportKind::Error,
        (
            first_conflict.file_path.to_string_lossy().to_string(),
            first_conflict.span.clone(),
        ),
    )
    .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
    .with_note(&merge_error.message);

    for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
        let label_msg = if idx == 0 {
            "first definition here"
        } else {
            "conflicts with this definition"
        };

        report = report.with_label(
            Label::new((
                conflict.file_path.to_string_lossy().to_string(),
                conflict.span.clone(),
            ))
            .with_message(label_msg)
            .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
        );
    }

    let finished_report = report.finish();

    // Write once per unique source file
    let mut written_files = std::collections::HashSet::new();
    for conflict in &merge_error.conflicts {
        let file_id = conflict.file_path.to_string_lossy().to_string();
        if written_files.insert(file_id.clone()) {
            let source = Source::from(&conflict.content);
            finished_report.write((file_id, source), &mut *output).ok();
        }
    }
}

fn write_validation_error(validation_error: &ValidationError, output: &mut Vec<u8>) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    match (&validation_error.span, &validation_error.source) {
        (Some(span), Some(source)) => {
            let file_id = source.file_path.to_string_lossy().to_string();
            Report::build(ReportKind::Error, (file_id.clone(), span.clone()))
                .with_message(format!(
                    "Validation error in '{}'",
                    validation_error.field_path
                ))
                .with_label(
                    Label::new((file_id.clone(), span.clone()))
                        .with_message(&validation_error.message)
                        .with_color(Color::Red),
                )
                .finish()
                .write((file_id, Source::from(&source.content)), &mut *output)
                .ok();
        }
        _ => {
            let error_msg = format!(
                "Validation error in '{}': {}\n",
                validation_error.field_path, validation_error.message
            );
            output.extend_from_slice(error_msg.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_without_span() {
        let diagnostics = vec![Diagnostic::Error(Error::Validation(ValidationError {
            field_path: "integrations.aquarea.username".to_string(),
            message: "username is required".to_string(),
            span: None,
            source: None,
        }))];

        let output = format_diagnostics(&diagnostics);
        assert_eq!(
            output,
            "Validation error in 'integrations.aquarea.username': username is required\n"
        );
    }

    #[test]
    fn test_validation_error_with_span_mentions_field() {
        let content = "[integrations.aquarea]\ntimezone = \"Mars/Olympus\"\n".to_string();
        let start = content.find("\"Mars").unwrap();
        let diagnostics = vec![Diagnostic::Error(Error::Validation(ValidationError {
            field_path: "integrations.aquarea.timezone".to_string(),
            message: "unknown timezone 'Mars/Olympus'".to_string(),
            span: Some(start..start + "\"Mars/Olympus\"".len()),
            source: Some(SourceInfo {
                file_path: PathBuf::from("aquad.toml"),
                content,
            }),
        }))];

        let output = format_diagnostics(&diagnostics);
        assert!(output.contains("integrations.aquarea.timezone"));
        assert!(output.contains("unknown timezone"));
    }

    #[test]
    fn test_empty_config_warning() {
        let diagnostics = vec![Diagnostic::Warning(Warning::EmptyConfig {
            file_path: PathBuf::from("/etc/aquad/empty.toml"),
        })];

        assert!(diagnostics[0].is_warning());
        assert!(!diagnostics[0].is_error());
        assert_eq!(
            format_diagnostics(&diagnostics),
            "Warning: Config file '/etc/aquad/empty.toml' is empty and has no effect\n"
        );
    }
}
