// Export service modules
mod dashboard_service;

pub use dashboard_service::*;
