/// User-visible, non-blocking notices raised by the synchronization layer.
///
/// Every notice is logged; when a receiver is attached it is also forwarded
/// so a front end can render it (the CLI prints them).
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: "Success".to_string(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationSender {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl NotificationSender {
    pub fn new(tx: Option<mpsc::UnboundedSender<Notice>>) -> Self {
        Self { tx }
    }

    /// A sender plus the receiver its notices arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(Some(tx)), rx)
    }

    pub fn send(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(description = %notice.description, "Notice"),
            NoticeLevel::Error => tracing::warn!(description = %notice.description, "Notice"),
        }

        if let Some(tx) = &self.tx {
            if tx.send(notice).is_err() {
                tracing::debug!("Notice receiver dropped");
            }
        }
    }

    pub fn success(&self, description: impl Into<String>) {
        self.send(Notice::success(description));
    }

    pub fn error(&self, description: impl Into<String>) {
        self.send(Notice::error(description));
    }
}
