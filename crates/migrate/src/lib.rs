mod directory;
mod executor;
mod shadow;

pub use directory::{MigrationDirectory, list_migrations, write_migration};
pub use executor::{AppliedMigration, MigrationExecutor, MigrationScript, checksum};
pub use shadow::ShadowDatabase;
