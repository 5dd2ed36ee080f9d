//! RadicalMart 2.x -> 3.0.0.
//!
//! Moves products and meta-variants to the category pathway/route model,
//! moves legacy ordering into the shared ordering table, consolidates
//! category totals, splits field fieldsets, renames component params and
//! rewrites legacy categories menu items. The last two steps re-save every
//! product and meta through the admin model.

mod entities;
mod menu;
mod params;
mod resave;
mod structure;
pub mod transforms;

pub use entities::EntityStructureStep;
pub use menu::MenuItemsStep;
pub use params::{ComponentParamsStep, PARAMS_MAPPING};
pub use resave::ResaveStep;
pub use structure::{
    AlphaStructuresStep, CategoriesStructureStep, FieldsStructureStep, UsersColumnsStep,
};

use super::Migration;
use crate::engine::MigrationStep;
use crate::entity::EntityKind;

pub struct RadicalMart300;

impl Migration for RadicalMart300 {
    fn version(&self) -> &'static str {
        "3.0.0"
    }

    fn description(&self) -> &'static str {
        "Update RadicalMart from 2.0.0 to 3.0.0"
    }

    fn steps(&self) -> Vec<Box<dyn MigrationStep>> {
        vec![
            Box::new(AlphaStructuresStep),
            Box::new(ComponentParamsStep),
            Box::new(UsersColumnsStep),
            Box::new(EntityStructureStep::new(EntityKind::Product)),
            Box::new(EntityStructureStep::new(EntityKind::Meta)),
            Box::new(CategoriesStructureStep),
            Box::new(FieldsStructureStep),
            Box::new(MenuItemsStep),
            Box::new(ResaveStep::new(EntityKind::Product)),
            Box::new(ResaveStep::new(EntityKind::Meta)),
        ]
    }
}
