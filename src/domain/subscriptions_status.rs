//! src/domain/subscriptions_status.rs

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "subscriptions_status", rename_all = "snake_case")]
pub enum SubscriptionsStatus {
    PendingConfirmation,
    Confirmed,
}

impl AsRef<str> for SubscriptionsStatus {
    fn as_ref(&self) -> &str {
        match self {
            SubscriptionsStatus::PendingConfirmation => "pending_confirmation",
            SubscriptionsStatus::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for SubscriptionsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
