use async_trait::async_trait;

/// Answers whether a user already holds valid OAuth credentials.
///
/// The real implementation lives in an external credential store; the
/// router only depends on this signature and on how the answer steers
/// dispatch.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn has_credentials(&self, user_id: &str) -> bool;
}

/// Stub boundary: always answers `false`, so every authorization
/// command starts the consent flow.
#[derive(Debug, Default)]
pub struct StubCredentialStore;

#[async_trait]
impl CredentialStore for StubCredentialStore {
    async fn has_credentials(&self, _user_id: &str) -> bool {
        false
    }
}
