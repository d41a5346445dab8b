use uuid::Uuid;

use crate::ports::notifier::{Error, Notification, NotifierPort};

/// Notifier that writes to the tracing subscriber instead of a push
/// backend. The default wiring until a real delivery channel exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), Error> {
        tracing::info!(
            %user_id,
            category = notification.category.as_str(),
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}
