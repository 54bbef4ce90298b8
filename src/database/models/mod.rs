pub mod client;
pub mod contract;
pub mod financial;
pub mod hardware;
pub mod integration;
pub mod team;
pub mod tenant;
pub mod user;

pub use client::{Client, ClientStatus};
pub use contract::{Contract, ContractStatus, SafStatus, ServiceScope};
pub use financial::{FinancialTransaction, TransactionCategory, TransactionStatus, TransactionType};
pub use hardware::{AssignmentStatus, ClientHardwareAssignment, HardwareAsset, HardwareStatus, HardwareType};
pub use integration::{AuthType, DataSourceQuery, ExpectedType, ExternalDataSource, QueryMethod};
pub use team::{ClientTeamAssignment, TeamRole};
pub use tenant::Tenant;
pub use user::User;
