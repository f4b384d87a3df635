// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Route Prefix: /api/root/*
// Middleware: auth_middleware + require_admin. No company context is resolved;
// these handlers name the company they act on explicitly.
pub mod root;
