use tokio::process::Command;
use tokio::sync::Mutex;

use sweep_logging::{sweep_debug, sweep_info};

use crate::SweepError;

/// Source of bearer tokens for the mail API.
///
/// `invalidate` is called with a token the server rejected; the next call to
/// `token` should produce a fresh one if the provider is able to.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, SweepError>;

    async fn invalidate(&self, token: &str);
}

/// A fixed token, e.g. from the command line. It cannot be refreshed.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, SweepError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self, _token: &str) {
        sweep_debug!("Static token cannot be refreshed");
    }
}

/// Used when no credentials were configured; every request fails with an auth error.
#[derive(Debug, Clone, Default)]
pub struct MissingTokenProvider;

#[async_trait::async_trait]
impl TokenProvider for MissingTokenProvider {
    async fn token(&self) -> Result<String, SweepError> {
        Err(SweepError::auth(
            "no access token configured (use --token or --token-command)",
        ))
    }

    async fn invalidate(&self, _token: &str) {}
}

/// Runs a shell command and uses its trimmed stdout as the token.
///
/// The token is cached until the server rejects it.
pub struct CommandTokenProvider {
    command: String,
    cached: Mutex<Option<String>>,
}

impl CommandTokenProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cached: Mutex::new(None),
        }
    }

    async fn run(&self) -> Result<String, SweepError> {
        let output = shell(&self.command)
            .output()
            .await
            .map_err(|err| SweepError::auth(format!("failed to run token command: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SweepError::auth(format!(
                "token command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(SweepError::auth("token command produced no output"));
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl TokenProvider for CommandTokenProvider {
    async fn token(&self) -> Result<String, SweepError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        sweep_info!("Acquiring access token from command");
        let token = self.run().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self, token: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_deref() == Some(token) {
            *cached = None;
        }
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_token_is_trimmed_and_cached() {
        let provider = CommandTokenProvider::new("echo '  tok-123  '");
        assert_eq!(provider.token().await.unwrap(), "tok-123");
        assert_eq!(provider.cached.lock().await.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn invalidate_only_clears_matching_token() {
        let provider = CommandTokenProvider::new("echo tok-1");
        provider.token().await.unwrap();

        provider.invalidate("other").await;
        assert!(provider.cached.lock().await.is_some());

        provider.invalidate("tok-1").await;
        assert!(provider.cached.lock().await.is_none());
    }

    #[tokio::test]
    async fn failing_command_is_an_auth_error() {
        let provider = CommandTokenProvider::new("echo nope >&2; exit 3");
        let err = provider.token().await.unwrap_err();
        assert_eq!(err.kind, crate::FailureKind::Auth);
        assert!(err.message.contains("nope"));
    }

    #[tokio::test]
    async fn empty_output_is_an_auth_error() {
        let provider = CommandTokenProvider::new("true");
        let err = provider.token().await.unwrap_err();
        assert_eq!(err.kind, crate::FailureKind::Auth);
    }
}
