use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

/// Delay between finishing a survey and following its redirect, leaving
/// time for the completion message.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Performs the actual page navigation for a scheduled redirect.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Navigator that only logs; used when no host page is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &Url) {
        tracing::info!(url = %url, "redirecting respondent");
    }
}

/// Adds an `https://` scheme when the configured target has none.
pub fn normalize_redirect_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{}", trimmed))
    }
}

/// A pending redirect. Dropping the handle cancels it.
#[derive(Debug)]
pub struct RedirectHandle {
    url: Url,
    task: JoinHandle<()>,
}

impl RedirectHandle {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for RedirectHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Navigates to `url` after `delay` on the current tokio runtime.
///
/// Returns `None` when called outside a runtime; nothing is scheduled then.
pub fn schedule_redirect(
    url: Url,
    delay: Duration,
    navigator: Arc<dyn Navigator>,
) -> Option<RedirectHandle> {
    let runtime = Handle::try_current().ok()?;
    let target = url.clone();
    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        navigator.navigate(&target);
    });
    Some(RedirectHandle { url, task })
}
