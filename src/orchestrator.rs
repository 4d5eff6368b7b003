//! Run orchestration: the explicit state machine that orders the conversion
//! steps and produces the end-of-run summary.
//!
//! Terms must be converted before posts, because the post step rewrites
//! taxonomy references using the canonical ids the term step records. That
//! ordering is a checked state transition here, not a call-order convention
//! inside the converters.

use chrono::Utc;

use crate::cleanup::cleanup;
use crate::config::Config;
use crate::convert::ConvertState;
use crate::convert::posts::convert_posts;
use crate::convert::terms::convert_terms;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::lock::acquire_run_lock;
use crate::output::{Reporter, RunSummary};
use crate::schema::remap::remap;
use crate::verify::verify_ready;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Prepare,
    Convert,
    Cleanup,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Convert => "convert",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Prepare,
    Verify,
    ConvertTerms,
    ConvertPosts,
    Done,
    Failed,
}

impl RunState {
    /// Legal transitions. `ConvertPosts` is reachable only from
    /// `ConvertTerms`; any active state may fail.
    pub fn permits(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Prepare, Self::Done)
                | (Self::Verify, Self::ConvertTerms)
                | (Self::ConvertTerms, Self::ConvertPosts)
                | (Self::ConvertPosts, Self::Done)
                | (
                    Self::Prepare | Self::Verify | Self::ConvertTerms | Self::ConvertPosts,
                    Self::Failed
                )
        )
    }
}

struct Machine {
    state: RunState,
}

impl Machine {
    fn new(initial: RunState) -> Self {
        Self { state: initial }
    }

    fn advance(&mut self, next: RunState) {
        assert!(
            self.state.permits(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn fail(&mut self) {
        self.state = RunState::Failed;
    }
}

pub struct Orchestrator {
    config: Config,
    dry_run: bool,
    reporter: Reporter,
}

impl Orchestrator {
    pub fn new(config: Config, dry_run: bool, reporter: Reporter) -> Self {
        Self {
            config,
            dry_run,
            reporter,
        }
    }

    /// Execute one mode end to end under the run lock and return the
    /// summary. Any error aborts the run; the caller reports it and exits
    /// non-zero.
    pub fn run(&self, mode: Mode) -> Result<RunSummary> {
        let _lock = acquire_run_lock(&self.config.database.path)?;
        let mut gateway = Gateway::open(&self.config.database.path, self.dry_run, self.reporter)?;

        let mut summary = RunSummary::new(mode.as_str(), self.dry_run);
        let outcome = match mode {
            Mode::Prepare => self.prepare(&mut gateway, &mut summary),
            Mode::Convert => self.convert(&mut gateway, &mut summary),
            Mode::Cleanup => self.cleanup(&mut gateway, &mut summary),
        };

        summary.statements_executed = gateway.executed_count();
        summary.statements_recorded = gateway.recorded_count();
        summary.finished_at = Utc::now().to_rfc3339();
        outcome?;
        summary.state = "done".to_string();
        Ok(summary)
    }

    fn prepare(&self, gateway: &mut Gateway, summary: &mut RunSummary) -> Result<()> {
        let mut machine = Machine::new(RunState::Prepare);
        let report = match remap(gateway, &self.config.prefixes) {
            Ok(report) => report,
            Err(e) => {
                machine.fail();
                return Err(e);
            }
        };
        machine.advance(RunState::Done);
        summary.tables_remapped = report.tables_remapped;

        self.reporter.info("schema prepared; before converting:");
        self.reporter
            .info("  1. install the target platform against this database, keeping the prefixed tables");
        self.reporter
            .info("  2. activate the 'polylang' language plugin");
        self.reporter
            .info("  3. run `smkconv convert` (try --dry-run first to review the planned statements)");
        Ok(())
    }

    fn convert(&self, gateway: &mut Gateway, summary: &mut RunSummary) -> Result<()> {
        let mut machine = Machine::new(RunState::Verify);
        match self.convert_steps(gateway, summary, &mut machine) {
            Ok(()) => Ok(()),
            Err(e) => {
                machine.fail();
                Err(e)
            }
        }
    }

    fn convert_steps(
        &self,
        gateway: &mut Gateway,
        summary: &mut RunSummary,
        machine: &mut Machine,
    ) -> Result<()> {
        verify_ready(gateway.conn(), &self.config)?;
        machine.advance(RunState::ConvertTerms);

        let mut state = ConvertState::load(
            gateway.conn(),
            &self.config.prefixes,
            &self.config.languages.default,
        )?;

        self.reporter.info("converting terms");
        let term_report = convert_terms(gateway, &mut state, self.reporter)?;
        machine.advance(RunState::ConvertPosts);

        self.reporter.info("converting posts");
        let post_report = convert_posts(gateway, &mut state, self.reporter)?;
        machine.advance(RunState::Done);

        summary.terms_converted = term_report.terms_converted;
        summary.posts_converted = post_report.posts_converted;
        summary.languages_created = state.languages_created;
        summary.groups_created = state.groups_created;
        summary.warnings = term_report.warnings;
        summary.warnings.extend(post_report.warnings);
        Ok(())
    }

    fn cleanup(&self, gateway: &mut Gateway, summary: &mut RunSummary) -> Result<()> {
        let report = cleanup(gateway, &self.config)?;
        summary.columns_dropped = report.columns_dropped;
        if report.columns_dropped == 0 {
            self.reporter.info("nothing to drop");
        }
        Ok(())
    }
}
