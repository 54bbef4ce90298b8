pub mod auth_service;
pub mod client_service;
pub mod contract_service;
pub mod dashboard_service;
pub mod financial_service;
pub mod hardware_service;
pub mod integration_service;
pub mod team_service;
pub mod tenant_service;
pub mod user_service;
