pub mod bootstrap;
pub mod catalog;
pub mod connect;
pub mod members;
pub mod registry;

pub use bootstrap::{PgSchemaBootstrapper, SchemaBootstrap, REQUIRED_TABLES, TENANT_SCHEMA};
pub use catalog::{Catalog, CatalogDatabase, CreateOutcome, PgCatalog};
pub use connect::{quote_identifier, ServerAddress};
pub use members::{MemberDirectory, PgMemberDirectory};
pub use registry::{PoolRegistry, PoolSettings};
