pub use sea_orm_migration::prelude::*;

mod m20261001_000000_init;

/// Database used when neither `DATABASE_URL` nor the settings name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./coopfleet.db?mode=rwc";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261001_000000_init::Migration)]
    }
}
