// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (credential + company context) → Elevated (admin)
pub mod public; // Tier 1: No authentication required (/health)
pub mod protected; // Tier 2: JWT or service key, company resolved (/api/tenant/*)
pub mod elevated; // Tier 3: Admin role required (/api/root/*)
