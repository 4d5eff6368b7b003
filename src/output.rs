use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

/// A recoverable data-integrity problem found in the legacy data. The
/// offending record is skipped; the run continues and the warning is
/// carried into the run summary with enough context for manual remediation.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub stage: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Warning {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            legacy_id: None,
            group_key: None,
            language: None,
        }
    }

    pub fn legacy_id(mut self, id: i64) -> Self {
        self.legacy_id = Some(id);
        self
    }

    pub fn group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.language = Some(lang.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mode: String,
    pub dry_run: bool,
    pub state: String,
    pub tables_remapped: usize,
    pub terms_converted: usize,
    pub posts_converted: usize,
    pub languages_created: usize,
    pub groups_created: usize,
    pub columns_dropped: usize,
    pub statements_executed: usize,
    pub statements_recorded: usize,
    pub finished_at: String,
    pub warnings: Vec<Warning>,
}

impl RunSummary {
    pub fn new(mode: &str, dry_run: bool) -> Self {
        Self {
            mode: mode.to_string(),
            dry_run,
            state: "failed".to_string(),
            tables_remapped: 0,
            terms_converted: 0,
            posts_converted: 0,
            languages_created: 0,
            groups_created: 0,
            columns_dropped: 0,
            statements_executed: 0,
            statements_recorded: 0,
            finished_at: String::new(),
            warnings: Vec::new(),
        }
    }
}

/// Progress output in the selected format. Progress and per-statement lines
/// go to stderr; the machine-readable run summary goes to stdout.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    format: Format,
}

impl Reporter {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn info(&self, message: &str) {
        match self.format {
            Format::Json => eprintln!(
                "{}",
                serde_json::json!({ "level": "info", "message": message })
            ),
            Format::Pretty => eprintln!("{}", message),
        }
    }

    /// One line per gateway call, live or dry.
    pub fn action(&self, dry_run: bool, description: &str, rows_affected: usize) {
        match self.format {
            Format::Json => eprintln!(
                "{}",
                serde_json::json!({
                    "level": "action",
                    "dry_run": dry_run,
                    "description": description,
                    "rows_affected": rows_affected,
                })
            ),
            Format::Pretty => {
                if dry_run {
                    eprintln!("  {} {}", "[dry]".yellow(), description);
                } else {
                    eprintln!("  {} {} ({} rows)", "[db]".green(), description, rows_affected);
                }
            }
        }
    }

    pub fn warn(&self, warning: &Warning) {
        match self.format {
            Format::Json => eprintln!(
                "{}",
                serde_json::json!({ "level": "warning", "warning": warning })
            ),
            Format::Pretty => eprintln!("{} [{}] {}", "warning:".yellow().bold(), warning.stage, warning.message),
        }
    }

    pub fn summary(&self, summary: &RunSummary) -> Result<()> {
        match self.format {
            Format::Json => println!("{}", serde_json::to_string(summary)?),
            Format::Pretty => {
                let state = if summary.state == "done" {
                    summary.state.green().bold()
                } else {
                    summary.state.red().bold()
                };
                println!("{} mode finished: {}", summary.mode, state);
                if summary.dry_run {
                    println!(
                        "  dry run: {} statements recorded, none executed",
                        summary.statements_recorded
                    );
                } else {
                    println!("  {} statements executed", summary.statements_executed);
                }
                println!(
                    "  tables remapped: {} | terms: {} | posts: {} | languages: {} | groups: {}",
                    summary.tables_remapped,
                    summary.terms_converted,
                    summary.posts_converted,
                    summary.languages_created,
                    summary.groups_created
                );
                if summary.columns_dropped > 0 {
                    println!("  columns dropped: {}", summary.columns_dropped);
                }
                if !summary.warnings.is_empty() {
                    println!("  {} warning(s):", summary.warnings.len());
                    for w in &summary.warnings {
                        println!("    [{}] {}", w.stage, w.message);
                    }
                }
            }
        }
        Ok(())
    }
}
