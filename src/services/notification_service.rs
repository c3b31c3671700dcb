use chrono::Utc;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::db::entity::{ notification, Notification };
use crate::enums::{ NotificationCategory, NotificationSeverity };
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub category: NotificationCategory,
    pub metadata: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(
        category: NotificationCategory,
        severity: NotificationSeverity,
        title: impl Into<String>,
        message: impl Into<String>
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            category,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// In-app notification inbox.
pub struct NotificationService {
    db: DatabaseConnection,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Fire-and-forget: a failed insert is logged and swallowed so it can
    /// never undo the operation being reported.
    pub async fn notify(&self, user_id: &str, notification: NewNotification) {
        if let Err(e) = self.store(user_id, notification).await {
            tracing::warn!("Failed to store notification for user {}: {}", user_id, e);
        }
    }

    async fn store(&self, user_id: &str, notification: NewNotification) -> Result<()> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            title: Set(notification.title),
            message: Set(notification.message),
            severity: Set(notification.severity.as_str().to_string()),
            category: Set(notification.category.as_str().to_string()),
            metadata: Set(notification.metadata.map(|m| m.to_string())),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        };

        model.insert(&self.db).await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<notification::Model>> {
        let notifications = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(notifications)
    }
}
