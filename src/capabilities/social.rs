//! Social posting collaborator

use std::sync::Mutex;

use async_trait::async_trait;
use log::info;

use super::CapabilityError;
use crate::id::hex_digest;

/// Maximum length of a post
pub const MAX_POST_CHARS: usize = 280;

/// Publishes short posts and returns the platform's post id
#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, message: &str, media_url: Option<&str>) -> Result<String, CapabilityError>;
}

/// Logs posts instead of publishing them
#[derive(Debug, Default)]
pub struct DryRunPoster {
    handle: Option<String>,
    posts: Mutex<Vec<String>>,
}

impl DryRunPoster {
    pub fn new(handle: Option<String>) -> Self {
        Self {
            handle,
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Messages posted so far
    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SocialPoster for DryRunPoster {
    async fn post(&self, message: &str, media_url: Option<&str>) -> Result<String, CapabilityError> {
        if message.trim().is_empty() {
            return Err(CapabilityError::Precondition("post message is empty".to_string()));
        }
        if message.chars().count() > MAX_POST_CHARS {
            return Err(CapabilityError::Precondition(format!(
                "post exceeds {} characters",
                MAX_POST_CHARS
            )));
        }

        let mut posts = self
            .posts
            .lock()
            .map_err(|_| CapabilityError::Backend("post log poisoned".to_string()))?;
        posts.push(message.to_string());

        let seq = posts.len().to_string();
        let handle = self.handle.as_deref().unwrap_or("anonymous");
        let digest = hex_digest(&[handle, message, &seq], 16);
        let id = digest.trim_start_matches("0x").to_string();

        info!(
            "[dry-run] @{} posted: {}{}",
            handle,
            message,
            media_url.map(|u| format!(" (media: {})", u)).unwrap_or_default()
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_post_records_message() {
        let poster = DryRunPoster::new(Some("chainpilot".to_string()));
        let id = poster.post("gm, deployed My NFT", None).await.unwrap();
        assert_eq!(id.len(), 16);
        assert_eq!(poster.posts(), vec!["gm, deployed My NFT".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_rejects_empty_and_long_posts() {
        let poster = DryRunPoster::default();
        assert!(poster.post("   ", None).await.is_err());
        assert!(poster.post(&"x".repeat(MAX_POST_CHARS + 1), None).await.is_err());
        assert!(poster.posts().is_empty());
    }

    #[tokio::test]
    async fn test_post_ids_differ() {
        let poster = DryRunPoster::default();
        let a = poster.post("same", None).await.unwrap();
        let b = poster.post("same", Some("https://example.com/a.png")).await.unwrap();
        assert_ne!(a, b);
    }
}
