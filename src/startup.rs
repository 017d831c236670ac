//! Boot-time checks. Any failure here is fatal.

use crate::error::{Result, StartupError};
use crate::llm::InferenceBackend;

/// Fail unless the inference server passes its health check.
pub async fn verify_upstream<B: InferenceBackend>(backend: &B, endpoint: &str) -> Result<()> {
    if backend.health_check().await {
        tracing::info!(endpoint, "inference server is online");
        Ok(())
    } else {
        Err(StartupError::UpstreamDown {
            endpoint: endpoint.to_string(),
        }
        .into())
    }
}

/// Fail if a guild restriction is configured and the bot has not joined it.
pub fn verify_guild(joined: &[String], restriction: Option<&str>) -> Result<()> {
    let Some(required) = restriction else {
        return Ok(());
    };

    if joined.iter().any(|name| name == required) {
        tracing::info!(guild = required, "target guild found");
        Ok(())
    } else {
        Err(StartupError::GuildMissing {
            guild: required.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn no_restriction_always_passes() {
        assert!(verify_guild(&[], None).is_ok());
    }

    #[test]
    fn restricted_guild_must_be_joined() {
        let joined = vec!["Misty Lake".to_string(), "Hakurei Shrine".to_string()];

        assert!(verify_guild(&joined, Some("Misty Lake")).is_ok());
        assert!(matches!(
            verify_guild(&joined, Some("Scarlet Mansion")),
            Err(Error::Startup(StartupError::GuildMissing { guild })) if guild == "Scarlet Mansion"
        ));
    }
}
