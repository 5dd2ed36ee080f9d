//! Runs a migration's steps in order and stops at the first failure.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::data_migrations::Migration;
use crate::error::{MigrationError, Result};
use crate::kernel::MigrationDeps;

/// What a step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSummary {
    pub rows_scanned: u64,
    pub rows_updated: u64,
    pub rows_inserted: u64,
    /// Rows left as they were because their legacy value had an unknown shape
    pub rows_skipped: u64,
    pub ddl_statements: u64,
    /// The step found nothing to do
    pub already_current: bool,
}

impl StepSummary {
    pub fn current() -> Self {
        Self {
            already_current: true,
            ..Self::default()
        }
    }

    pub fn with_ddl(mut self, statements: usize) -> Self {
        self.ddl_statements += statements as u64;
        self
    }

    pub fn writes(&self) -> u64 {
        self.rows_updated + self.rows_inserted
    }

    /// Mark the summary current when the step changed nothing.
    pub fn settle(mut self) -> Self {
        self.already_current = self.ddl_statements == 0 && self.writes() == 0;
        self
    }

    pub fn merge(&mut self, other: StepSummary) {
        self.rows_scanned += other.rows_scanned;
        self.rows_updated += other.rows_updated;
        self.rows_inserted += other.rows_inserted;
        self.rows_skipped += other.rows_skipped;
        self.ddl_statements += other.ddl_statements;
        self.already_current = self.already_current && other.already_current;
    }
}

/// A single, named unit of a migration.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Stable identifier (`update_products_structure`)
    fn name(&self) -> &'static str;

    /// Heading shown to the operator
    fn title(&self) -> &'static str;

    /// Steps that round-trip rows through the admin model
    fn is_resave(&self) -> bool {
        false
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running { step: usize },
    Completed,
    Failed { step: usize },
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: &'static str,
    pub summary: StepSummary,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn total(&self) -> StepSummary {
        let mut total = StepSummary::current();
        for step in &self.steps {
            total.merge(step.summary);
        }
        total
    }

    pub fn step(&self, name: &str) -> Option<&StepSummary> {
        self.steps
            .iter()
            .find(|report| report.name == name)
            .map(|report| &report.summary)
    }
}

pub struct MigrationRunner {
    steps: Vec<Box<dyn MigrationStep>>,
    state: RunState,
}

impl MigrationRunner {
    pub fn new(steps: Vec<Box<dyn MigrationStep>>) -> Self {
        Self {
            steps,
            state: RunState::Pending,
        }
    }

    pub fn for_migration(migration: &dyn Migration) -> Self {
        Self::new(migration.steps())
    }

    /// Leave out the steps that need the admin model.
    pub fn without_resave(mut self) -> Self {
        self.steps.retain(|step| !step.is_resave());
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every step once, in order. The first failure stops the run and is
    /// returned wrapped in [`MigrationError::Step`].
    pub async fn run(&mut self, deps: &MigrationDeps) -> Result<RunReport> {
        let mut report = RunReport::default();

        for (index, step) in self.steps.iter().enumerate() {
            self.state = RunState::Running { step: index };
            deps.progress.title(step.title());
            info!(step = step.name(), "step started");

            let started = Instant::now();
            match step.run(deps).await {
                Ok(summary) => {
                    let elapsed = started.elapsed();
                    info!(
                        step = step.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        scanned = summary.rows_scanned,
                        writes = summary.writes(),
                        skipped = summary.rows_skipped,
                        ddl = summary.ddl_statements,
                        "step finished"
                    );
                    report.steps.push(StepReport {
                        name: step.name(),
                        summary,
                        elapsed,
                    });
                }
                Err(e) => {
                    self.state = RunState::Failed { step: index };
                    error!(step = step.name(), error = %e, "step failed");
                    return Err(MigrationError::Step {
                        step: step.name(),
                        source: Box::new(e),
                    });
                }
            }
        }

        self.state = RunState::Completed;
        Ok(report)
    }
}
