pub mod wallet;
pub mod transaction;
pub mod beneficiary;
pub mod scheduled_topup;
pub mod execution_log;
pub mod budget;
pub mod spending_event;
pub mod notification;

pub use wallet::Entity as Wallet;
pub use transaction::Entity as Transaction;
pub use beneficiary::Entity as Beneficiary;
pub use scheduled_topup::Entity as ScheduledTopup;
pub use execution_log::Entity as ExecutionLog;
pub use budget::Entity as Budget;
pub use spending_event::Entity as SpendingEvent;
pub use notification::Entity as Notification;
