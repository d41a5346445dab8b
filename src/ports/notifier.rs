use uuid::Uuid;

/// Fire-and-forget user notification.
///
/// Delivery mechanics (push, sockets, presence lookup) live behind this
/// boundary; the engine never waits on them and a failed dispatch never
/// rolls back a committed state transition.
#[mockall::automock]
#[async_trait::async_trait]
pub trait NotifierPort {
    async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub metadata: Option<serde_json::Value>,
}

impl Notification {
    pub fn membership(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body, NotificationCategory::Membership)
    }

    pub fn system(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body, NotificationCategory::System)
    }

    pub fn access(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body, NotificationCategory::Access)
    }

    fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Subscription lifecycle updates.
    Membership,
    /// Booking workflow updates.
    System,
    /// Door scan audit trail.
    Access,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Membership => "membership",
            NotificationCategory::System => "system",
            NotificationCategory::Access => "access",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
