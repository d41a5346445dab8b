use base64::{engine::general_purpose::STANDARD, Engine};

use crate::ports::credentials::{CredentialPort, Error, ScannableArtifact};

/// Credential renderer that inlines the token as a `data:` URL instead
/// of calling out to a QR generator.
///
/// A stand-in for the real rendering service; scanners in tests decode
/// the payload directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineCredentialRenderer;

#[async_trait::async_trait]
impl CredentialPort for InlineCredentialRenderer {
    async fn render_scannable(&self, token: &str) -> Result<ScannableArtifact, Error> {
        let data_url = format!("data:text/plain;base64,{}", STANDARD.encode(token));
        Ok(ScannableArtifact {
            content_type: "text/plain;charset=utf-8".to_string(),
            data: data_url.into_bytes(),
        })
    }
}
