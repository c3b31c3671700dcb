pub mod budget_service;
pub mod notification_service;
pub mod purchase_service;
pub mod reconciliation_service;
pub mod scheduling_service;
pub mod wallet_service;

pub use budget_service::BudgetService;
pub use notification_service::NotificationService;
pub use purchase_service::PurchaseService;
pub use reconciliation_service::ReconciliationService;
pub use scheduling_service::SchedulingService;
pub use wallet_service::WalletService;
