use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Why connected admin dashboards should refresh.
///
/// The wire names are stable; the frontend switches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshReason {
    #[serde(rename = "stock.init")]
    StockInit,
    #[serde(rename = "history.delete_all")]
    HistoryDeleteAll,
    #[serde(rename = "history.delete_user")]
    HistoryDeleteUser,
    #[serde(rename = "history.delete_log")]
    HistoryDeleteLog,
    #[serde(rename = "history.add_user")]
    HistoryAddUser,
    #[serde(rename = "history.update_log")]
    HistoryUpdateLog,
    #[serde(rename = "admin.consume")]
    AdminConsume,
}

impl RefreshReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StockInit => "stock.init",
            Self::HistoryDeleteAll => "history.delete_all",
            Self::HistoryDeleteUser => "history.delete_user",
            Self::HistoryDeleteLog => "history.delete_log",
            Self::HistoryAddUser => "history.add_user",
            Self::HistoryUpdateLog => "history.update_log",
            Self::AdminConsume => "admin.consume",
        }
    }
}

/// One dashboard refresh notification.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEvent {
    pub reason: RefreshReason,
    /// The user the change concerns, when there is one.
    pub user_id: Option<i32>,
    pub at: DateTime<Utc>,
}

/// Process-scoped broadcast channel behind the admin dashboard stream.
///
/// Best-effort by design: publishing with no connected dashboards is a
/// no-op, and a lagging subscriber silently drops events.
#[derive(Debug, Clone)]
pub struct DashboardEvents {
    tx: broadcast::Sender<DashboardEvent>,
}

impl DashboardEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn publish(&self, reason: RefreshReason, user_id: Option<i32>) {
        let event = DashboardEvent {
            reason,
            user_id,
            at: Utc::now(),
        };
        // Err here only means nobody is listening right now.
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(
            "Published dashboard event '{}' to {} subscriber(s)",
            reason.as_str(),
            receivers
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }
}

impl Default for DashboardEvents {
    fn default() -> Self {
        Self::new()
    }
}
