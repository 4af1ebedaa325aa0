use std::sync::atomic::{AtomicBool, Ordering};
use serde::{Deserialize, Serialize};

/// Tag shared by whale notifications so clients can collapse them
pub const WHALE_ALERT_TAG: &str = "whale-alert";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

/// Delivery channel for user-facing notifications. Fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn show(&self, title: &str, body: &str, tag: Option<&'static str>);
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier {
    granted: AtomicBool,
}

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier { granted: AtomicBool::new(false) }
    }
}

impl Notifier for LogNotifier {
    fn request_permission(&self) -> Permission {
        self.granted.store(true, Ordering::SeqCst);
        Permission::Granted
    }

    fn show(&self, title: &str, body: &str, tag: Option<&'static str>) {
        if !self.granted.load(Ordering::SeqCst) {
            tracing::debug!(title, "Notification dropped, permission not granted");
            return;
        }
        tracing::info!(target: "notifications", title, body, tag = tag.unwrap_or("-"), "Notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_is_granted_on_request() {
        let notifier = LogNotifier::new();
        assert!(!notifier.granted.load(Ordering::SeqCst));

        assert_eq!(notifier.request_permission(), Permission::Granted);
        assert!(notifier.granted.load(Ordering::SeqCst));
        notifier.show("title", "body", Some(WHALE_ALERT_TAG));
    }
}
