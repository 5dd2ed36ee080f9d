use async_trait::async_trait;

use crate::engine::{MigrationStep, ResaveDriver, StepSummary};
use crate::entity::EntityKind;
use crate::error::Result;
use crate::kernel::MigrationDeps;

/// Round-trips every entity of a kind through the admin model.
pub struct ResaveStep {
    kind: EntityKind,
}

impl ResaveStep {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl MigrationStep for ResaveStep {
    fn name(&self) -> &'static str {
        match self.kind {
            EntityKind::Product => "resave_products",
            EntityKind::Meta => "resave_metas",
        }
    }

    fn title(&self) -> &'static str {
        match self.kind {
            EntityKind::Product => "Resave products items",
            EntityKind::Meta => "Resave meta products items",
        }
    }

    fn is_resave(&self) -> bool {
        true
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        ResaveDriver::new(deps).resave_all(self.kind).await
    }
}
