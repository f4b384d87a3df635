pub mod error;
pub mod name;
pub mod principal;

pub use error::TenantError;
pub use name::{canonicalize, TenantDatabaseName, TenantKey, TenantNaming};
pub use principal::{Principal, Role};
