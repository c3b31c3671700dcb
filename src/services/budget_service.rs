use std::sync::Arc;

use chrono::{ DateTime, FixedOffset, Utc };
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{ Decimal, RoundingStrategy };
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    Set,
    SqlErr,
    sea_query::Expr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db::entity::{ budget, spending_event, Budget, SpendingEvent };
use crate::enums::{ NotificationCategory, NotificationSeverity, SpendingCategory };
use crate::error::{ AppError, Result };
use crate::services::notification_service::{ NewNotification, NotificationService };

/// Alert levels in the order they are reached.
pub const ALERT_THRESHOLDS: [i32; 4] = [50, 75, 90, 100];

/// Smallest monthly limit a user can set, in naira.
pub const MIN_BUDGET_AMOUNT: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub month_year: String,
    pub budget_amount: Decimal,
    pub amount_spent: Decimal,
    pub remaining: Decimal,
    pub percentage_used: i32,
    pub last_alert_level: i32,
}

impl From<&budget::Model> for BudgetSummary {
    fn from(budget: &budget::Model) -> Self {
        Self {
            month_year: budget.month_year.clone(),
            budget_amount: budget.budget_amount,
            amount_spent: budget.amount_spent,
            remaining: (budget.budget_amount - budget.amount_spent).max(Decimal::ZERO),
            percentage_used: percentage_used(budget.amount_spent, budget.budget_amount),
            last_alert_level: budget.last_alert_level,
        }
    }
}

/// Monthly spending limits and the events that count against them.
pub struct BudgetService {
    db: DatabaseConnection,
    notifications: Arc<NotificationService>,
    offset: FixedOffset,
}

impl BudgetService {
    pub fn new(db: DatabaseConnection, notifications: Arc<NotificationService>, offset: FixedOffset) -> Self {
        Self {
            db,
            notifications,
            offset,
        }
    }

    /// `YYYY-MM` of `at` in the schedule timezone.
    pub fn month_key(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%Y-%m").to_string()
    }

    /// Create or change the current month's limit. Spend and alert level are
    /// never reset by this.
    pub async fn set_budget(
        &self,
        user_id: &str,
        amount: Decimal,
        now: DateTime<Utc>
    ) -> Result<BudgetSummary> {
        if amount.fract() != Decimal::ZERO {
            return Err(AppError::validation("budget_amount", "Budget amount must be a whole number"));
        }
        if amount < MIN_BUDGET_AMOUNT {
            return Err(
                AppError::validation(
                    "budget_amount",
                    format!("Budget amount must be at least {}", MIN_BUDGET_AMOUNT)
                )
            );
        }

        let month_year = self.month_key(now);

        if let Some(existing) = self.find_budget(user_id, &month_year).await? {
            let mut active: budget::ActiveModel = existing.into();
            active.budget_amount = Set(amount);
            active.updated_at = Set(now);
            let updated = active.update(&self.db).await?;
            return Ok(BudgetSummary::from(&updated));
        }

        // Spending recorded before the budget existed still counts
        let already_spent: Decimal = self
            .list_spending(user_id, &month_year).await?
            .iter()
            .map(|e| e.amount)
            .sum();

        let created = budget::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            month_year: Set(month_year),
            budget_amount: Set(amount),
            amount_spent: Set(already_spent),
            last_alert_level: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = created.insert(&self.db).await?;
        tracing::info!("Budget of {} set for user {} ({})", amount, user_id, created.month_year);

        Ok(BudgetSummary::from(&created))
    }

    pub async fn get_summary(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<BudgetSummary>> {
        let budget = self.find_budget(user_id, &self.month_key(now)).await?;
        Ok(budget.as_ref().map(BudgetSummary::from))
    }

    pub async fn list_spending(
        &self,
        user_id: &str,
        month_year: &str
    ) -> Result<Vec<spending_event::Model>> {
        let events = SpendingEvent::find()
            .filter(spending_event::Column::UserId.eq(user_id))
            .filter(spending_event::Column::MonthYear.eq(month_year))
            .order_by_desc(spending_event::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(events)
    }

    /// Count a completed purchase against the month it happened in.
    ///
    /// Recording the same transaction twice is a no-op. At most one
    /// threshold alert is emitted per call.
    pub async fn record_spending(
        &self,
        user_id: &str,
        transaction_id: Uuid,
        category: SpendingCategory,
        amount: Decimal,
        at: DateTime<Utc>
    ) -> Result<()> {
        let month_year = self.month_key(at);

        let event = spending_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            month_year: Set(month_year.clone()),
            category: Set(category.as_str().to_string()),
            amount: Set(amount),
            transaction_id: Set(transaction_id),
            created_at: Set(at),
        };

        if let Err(e) = event.insert(&self.db).await {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                tracing::debug!("Spending for transaction {} already recorded", transaction_id);
                return Ok(());
            }
            return Err(e.into());
        }

        // Budgets are opt-in
        let Some(current) = self.find_budget(user_id, &month_year).await? else {
            return Ok(());
        };

        Budget::update_many()
            .col_expr(budget::Column::AmountSpent, Expr::col(budget::Column::AmountSpent).add(amount))
            .col_expr(budget::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(budget::Column::Id.eq(current.id))
            .exec(&self.db).await?;

        let updated = Budget::find_by_id(current.id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Budget".to_string()))?;

        let percentage = percentage_used(updated.amount_spent, updated.budget_amount);
        let Some(threshold) = threshold_to_alert(percentage, updated.last_alert_level) else {
            return Ok(());
        };

        // Only the writer that moves the level gets to notify
        let raised = Budget::update_many()
            .col_expr(budget::Column::LastAlertLevel, Expr::value(threshold))
            .filter(budget::Column::Id.eq(updated.id))
            .filter(budget::Column::LastAlertLevel.lt(threshold))
            .exec(&self.db).await?;

        if raised.rows_affected == 1 {
            tracing::info!("User {} reached {}% of budget for {}", user_id, threshold, month_year);
            self.notifications.notify(user_id, budget_alert(&updated, threshold, percentage)).await;
        }

        Ok(())
    }

    async fn find_budget(&self, user_id: &str, month_year: &str) -> Result<Option<budget::Model>> {
        let budget = Budget::find()
            .filter(budget::Column::UserId.eq(user_id))
            .filter(budget::Column::MonthYear.eq(month_year))
            .one(&self.db).await?;

        Ok(budget)
    }
}

/// `round(spent / budget * 100)`, half away from zero. Saturates at
/// `i32::MAX` when the ratio does not fit a `Decimal`.
pub fn percentage_used(spent: Decimal, budget: Decimal) -> i32 {
    if budget <= Decimal::ZERO {
        return 0;
    }
    spent
        .checked_div(budget)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|pct| pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i32())
        .unwrap_or(i32::MAX)
}

/// Lowest threshold reached but not yet alerted.
pub fn threshold_to_alert(percentage_used: i32, last_alert_level: i32) -> Option<i32> {
    ALERT_THRESHOLDS.iter()
        .copied()
        .find(|&t| percentage_used >= t && last_alert_level < t)
}

fn budget_alert(budget: &budget::Model, threshold: i32, percentage: i32) -> NewNotification {
    let (severity, title) = if threshold >= 100 {
        (NotificationSeverity::Error, "Monthly budget exceeded".to_string())
    } else if threshold >= 90 {
        (NotificationSeverity::Warning, format!("{}% of monthly budget used", threshold))
    } else {
        (NotificationSeverity::Info, format!("{}% of monthly budget used", threshold))
    };

    let message = format!(
        "You have spent ₦{} of your ₦{} budget for {} ({}%).",
        budget.amount_spent,
        budget.budget_amount,
        budget.month_year,
        percentage
    );

    NewNotification::new(NotificationCategory::Budget, severity, title, message).with_metadata(
        serde_json::json!({
            "month_year": budget.month_year,
            "threshold": threshold,
            "percentage_used": percentage,
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::test_utils::setup_test_db;

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        assert_eq!(percentage_used(dec!(500), dec!(1000)), 50);
        assert_eq!(percentage_used(dec!(745), dec!(1000)), 75);
        assert_eq!(percentage_used(dec!(744.9), dec!(1000)), 74);
        assert_eq!(percentage_used(dec!(1500), dec!(1000)), 150);
        assert_eq!(percentage_used(dec!(10), dec!(0)), 0);
    }

    #[test]
    fn test_percentage_saturates_on_tiny_budget() {
        assert_eq!(percentage_used(dec!(600), dec!(0.0000000000000000000000000001)), i32::MAX);
        assert_eq!(percentage_used(Decimal::MAX, dec!(0.5)), i32::MAX);
    }

    #[test]
    fn test_threshold_picks_lowest_unalerted() {
        assert_eq!(threshold_to_alert(49, 0), None);
        assert_eq!(threshold_to_alert(50, 0), Some(50));
        assert_eq!(threshold_to_alert(95, 0), Some(50));
        assert_eq!(threshold_to_alert(95, 50), Some(75));
        assert_eq!(threshold_to_alert(95, 90), None);
        assert_eq!(threshold_to_alert(130, 90), Some(100));
        assert_eq!(threshold_to_alert(250, 100), None);
    }

    async fn service() -> (BudgetService, Arc<NotificationService>) {
        let db = setup_test_db().await;
        let notifications = Arc::new(NotificationService::new(db.clone()));
        let offset = FixedOffset::east_opt(3600).unwrap();
        (BudgetService::new(db, notifications.clone(), offset), notifications)
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_month_key_uses_schedule_timezone() {
        let (budgets, _) = service().await;
        // 23:30 UTC on Jan 31 is already February in UTC+1
        assert_eq!(budgets.month_key(at("2024-01-31T23:30:00Z")), "2024-02");
        assert_eq!(budgets.month_key(at("2024-01-31T22:30:00Z")), "2024-01");
    }

    #[tokio::test]
    async fn test_budget_must_be_positive() {
        let (budgets, _) = service().await;
        let now = at("2024-03-10T10:00:00Z");
        assert!(budgets.set_budget("user-1", Decimal::ZERO, now).await.is_err());
        assert!(budgets.set_budget("user-1", dec!(-5), now).await.is_err());
    }

    #[tokio::test]
    async fn test_budget_rejects_fractional_and_tiny_amounts() {
        let (budgets, _) = service().await;
        let now = at("2024-03-10T10:00:00Z");

        for amount in [dec!(0.0000000000000000000000000001), dec!(99), dec!(1000.50)] {
            let err = budgets.set_budget("user-1", amount, now).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "budget_amount"));
        }
        assert!(budgets.get_summary("user-1", now).await.unwrap().is_none());

        let summary = budgets.set_budget("user-1", MIN_BUDGET_AMOUNT, now).await.unwrap();
        budgets
            .record_spending("user-1", Uuid::new_v4(), SpendingCategory::Airtime, dec!(600), now).await
            .unwrap();
        let summary_after = budgets.get_summary("user-1", now).await.unwrap().unwrap();
        assert_eq!(summary.budget_amount, dec!(100));
        assert_eq!(summary_after.percentage_used, 600);
        assert_eq!(summary_after.last_alert_level, 50);
    }

    #[tokio::test]
    async fn test_scenario_threshold_alerts_fire_once_each() {
        let (budgets, notifications) = service().await;
        let now = at("2024-03-10T10:00:00Z");
        budgets.set_budget("user-1", dec!(1000), now).await.unwrap();

        for (amount, expected_level) in [(dec!(400), 0), (dec!(200), 50), (dec!(50), 50), (dec!(500), 75)] {
            budgets
                .record_spending("user-1", Uuid::new_v4(), SpendingCategory::Airtime, amount, now).await
                .unwrap();
            let summary = budgets.get_summary("user-1", now).await.unwrap().unwrap();
            assert_eq!(summary.last_alert_level, expected_level);
        }

        let summary = budgets.get_summary("user-1", now).await.unwrap().unwrap();
        assert_eq!(summary.amount_spent, dec!(1150));
        assert_eq!(summary.remaining, Decimal::ZERO);
        assert_eq!(summary.percentage_used, 115);

        let alerts = notifications.list_for_user("user-1").await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|n| n.category == "budget"));
    }

    #[tokio::test]
    async fn test_updating_budget_keeps_spend_and_alert_level() {
        let (budgets, _) = service().await;
        let now = at("2024-03-10T10:00:00Z");
        budgets.set_budget("user-1", dec!(1000), now).await.unwrap();
        budgets
            .record_spending("user-1", Uuid::new_v4(), SpendingCategory::Data, dec!(600), now).await
            .unwrap();

        let summary = budgets.set_budget("user-1", dec!(5000), now).await.unwrap();
        assert_eq!(summary.amount_spent, dec!(600));
        assert_eq!(summary.last_alert_level, 50);
        assert_eq!(summary.percentage_used, 12);
    }

    #[tokio::test]
    async fn test_spending_without_budget_is_still_recorded() {
        let (budgets, notifications) = service().await;
        let now = at("2024-03-10T10:00:00Z");
        budgets
            .record_spending("user-1", Uuid::new_v4(), SpendingCategory::Airtime, dec!(300), now).await
            .unwrap();

        assert!(budgets.get_summary("user-1", now).await.unwrap().is_none());
        assert_eq!(budgets.list_spending("user-1", "2024-03").await.unwrap().len(), 1);
        assert!(notifications.list_for_user("user-1").await.unwrap().is_empty());

        // A budget created later starts from what was already spent
        let summary = budgets.set_budget("user-1", dec!(1000), now).await.unwrap();
        assert_eq!(summary.amount_spent, dec!(300));
        assert_eq!(summary.last_alert_level, 0);
    }

    #[tokio::test]
    async fn test_same_transaction_counts_once() {
        let (budgets, _) = service().await;
        let now = at("2024-03-10T10:00:00Z");
        budgets.set_budget("user-1", dec!(1000), now).await.unwrap();

        let tx_id = Uuid::new_v4();
        for _ in 0..2 {
            budgets
                .record_spending("user-1", tx_id, SpendingCategory::Airtime, dec!(100), now).await
                .unwrap();
        }

        let summary = budgets.get_summary("user-1", now).await.unwrap().unwrap();
        assert_eq!(summary.amount_spent, dec!(100));
    }
}
