pub use sea_orm_migration::prelude::*;

mod m20260301_000000_create_oauth2_tables;
mod m20260302_000000_add_refresh_revocation;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000000_create_oauth2_tables::Migration),
            Box::new(m20260302_000000_add_refresh_revocation::Migration),
        ]
    }
}
