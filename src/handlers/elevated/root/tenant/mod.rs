// handlers/elevated/root/tenant/mod.rs - Company database management
pub mod create; // POST /api/root/tenant
pub mod delete; // DELETE /api/root/tenant/:name
pub mod list; // GET /api/root/tenant
pub mod show; // GET /api/root/tenant/:name

pub use create::tenant_create;
pub use delete::tenant_delete;
pub use list::tenant_list;
pub use show::tenant_show;
