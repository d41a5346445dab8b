/// Renders an access token into a scannable artifact (a QR image).
///
/// The engine only ever produces the token string; turning it into
/// pixels is an external capability.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CredentialPort {
    async fn render_scannable(&self, token: &str) -> Result<ScannableArtifact, Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannableArtifact {
    pub content_type: String,
    pub data: Vec<u8>,
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
