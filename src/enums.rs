use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── Network ─────────────────────────────────────────────────────────

/// Mobile network operators served by the VTU provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "MTN", alias = "mtn")]
    Mtn,
    #[serde(rename = "GLO", alias = "glo")]
    Glo,
    #[serde(rename = "AIRTEL", alias = "airtel")]
    Airtel,
    #[serde(rename = "9MOBILE", alias = "9mobile")]
    NineMobile,
}

impl Network {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "MTN",
            Network::Glo => "GLO",
            Network::Airtel => "AIRTEL",
            Network::NineMobile => "9MOBILE",
        }
    }

    pub fn all() -> &'static [Network] {
        &[Network::Mtn, Network::Glo, Network::Airtel, Network::NineMobile]
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MTN" => Ok(Network::Mtn),
            "GLO" | "GLOBACOM" => Ok(Network::Glo),
            "AIRTEL" => Ok(Network::Airtel),
            "9MOBILE" | "ETISALAT" => Ok(Network::NineMobile),
            _ =>
                Err(
                    AppError::validation(
                        "network",
                        format!("Unsupported network: {}. Supported: MTN, GLO, AIRTEL, 9MOBILE", s)
                    )
                ),
        }
    }
}

// ─── PurchaseType ────────────────────────────────────────────────────

/// What a top-up buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    Airtime,
    Data,
}

impl PurchaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseType::Airtime => "airtime",
            PurchaseType::Data => "data",
        }
    }

    pub fn tx_type(&self) -> TxType {
        match self {
            PurchaseType::Airtime => TxType::AirtimePurchase,
            PurchaseType::Data => TxType::DataPurchase,
        }
    }

    pub fn spending_category(&self) -> SpendingCategory {
        match self {
            PurchaseType::Airtime => SpendingCategory::Airtime,
            PurchaseType::Data => SpendingCategory::Data,
        }
    }
}

impl fmt::Display for PurchaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "airtime" => Ok(PurchaseType::Airtime),
            "data" => Ok(PurchaseType::Data),
            _ =>
                Err(
                    AppError::validation(
                        "type",
                        format!("Invalid purchase type: {}. Supported: airtime, data", s)
                    )
                ),
        }
    }
}

// ─── ScheduleKind ────────────────────────────────────────────────────

/// Recurrence kind of a scheduled top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    OneTime,
    Daily,
    Weekly,
    Monthly,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::OneTime => "one_time",
            ScheduleKind::Daily => "daily",
            ScheduleKind::Weekly => "weekly",
            ScheduleKind::Monthly => "monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, ScheduleKind::OneTime)
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one_time" | "once" => Ok(ScheduleKind::OneTime),
            "daily" => Ok(ScheduleKind::Daily),
            "weekly" => Ok(ScheduleKind::Weekly),
            "monthly" => Ok(ScheduleKind::Monthly),
            _ =>
                Err(
                    AppError::validation(
                        "schedule_type",
                        format!(
                            "Invalid schedule type: {}. Supported: one_time, daily, weekly, monthly",
                            s
                        )
                    )
                ),
        }
    }
}

// ─── ScheduleStatus ─────────────────────────────────────────────────

/// Lifecycle state of a scheduled top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled schedules never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ScheduleStatus::Active),
            "paused" => Ok(ScheduleStatus::Paused),
            "completed" => Ok(ScheduleStatus::Completed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            _ => Err(AppError::Internal(format!("Invalid schedule status: {}", s))),
        }
    }
}

// ─── TxStatus ───────────────────────────────────────────────────────

/// Status of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(AppError::Internal(format!("Invalid tx status: {}", s))),
        }
    }
}

// ─── TxType ─────────────────────────────────────────────────────────

/// Kind of balance-affecting event in the wallet ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Deposit,
    AirtimePurchase,
    DataPurchase,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::AirtimePurchase => "airtime_purchase",
            TxType::DataPurchase => "data_purchase",
        }
    }

    /// Debits reduce the wallet balance, everything else credits it.
    pub fn is_debit(&self) -> bool {
        !matches!(self, TxType::Deposit)
    }

    /// Budget category a completed transaction of this type counts under.
    pub fn spending_category(&self) -> Option<SpendingCategory> {
        match self {
            TxType::Deposit => None,
            TxType::AirtimePurchase => Some(SpendingCategory::Airtime),
            TxType::DataPurchase => Some(SpendingCategory::Data),
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(TxType::Deposit),
            "airtime_purchase" => Ok(TxType::AirtimePurchase),
            "data_purchase" => Ok(TxType::DataPurchase),
            _ => Err(AppError::Internal(format!("Invalid tx type: {}", s))),
        }
    }
}

// ─── ExecutionOutcome ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failed,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── SpendingCategory ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpendingCategory {
    Airtime,
    Data,
}

impl SpendingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendingCategory::Airtime => "AIRTIME",
            SpendingCategory::Data => "DATA",
        }
    }
}

impl fmt::Display for SpendingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Notifications ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSeverity::Info => "info",
            NotificationSeverity::Success => "success",
            NotificationSeverity::Warning => "warning",
            NotificationSeverity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    ScheduledTopup,
    Purchase,
    Budget,
    Wallet,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::ScheduledTopup => "scheduled_topup",
            NotificationCategory::Purchase => "purchase",
            NotificationCategory::Budget => "budget",
            NotificationCategory::Wallet => "wallet",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing_accepts_aliases() {
        assert_eq!("mtn".parse::<Network>().unwrap(), Network::Mtn);
        assert_eq!("Etisalat".parse::<Network>().unwrap(), Network::NineMobile);
        assert_eq!(Network::NineMobile.to_string(), "9MOBILE");
        assert!("vodafone".parse::<Network>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Cancelled.is_terminal());
        assert!(!ScheduleStatus::Active.is_terminal());
        assert!(!ScheduleStatus::Paused.is_terminal());
    }

    #[test]
    fn test_status_strings_round_trip_through_storage_form() {
        for status in [
            ScheduleStatus::Active,
            ScheduleStatus::Paused,
            ScheduleStatus::Completed,
            ScheduleStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ScheduleStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_only_deposits_credit() {
        assert!(!TxType::Deposit.is_debit());
        assert!(TxType::AirtimePurchase.is_debit());
        assert!(PurchaseType::Data.tx_type().is_debit());
    }
}
