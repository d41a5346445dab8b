use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::ports::notifier::{Error, Notification, NotifierPort};

/// Notifier that records everything it is asked to send.
///
/// Useful in tests that assert on notification content rather than call
/// counts.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(Uuid, Notification)>>>,
}

impl RecordingNotifier {
    /// Everything dispatched so far, in order.
    pub fn sent(&self) -> Vec<(Uuid, Notification)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotifierPort for RecordingNotifier {
    async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), Error> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((user_id, notification));
        }
        Ok(())
    }
}
