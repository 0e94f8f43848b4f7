use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::redirect::REDIRECT_DELAY;

/// Query parameter that turns on preview mode.
pub const PREVIEW_PARAM: &str = "preview";
/// Query parameter identifying the respondent.
pub const USER_ID_PARAM: &str = "userId";
/// Query parameter selecting the display language.
pub const LANGUAGE_PARAM: &str = "lang";

/// Per-session configuration of a survey player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    /// Exercise the flow without writing anything remotely.
    pub preview: bool,
    pub user_id: Option<String>,
    /// Requested language; the survey default is used when absent.
    pub language: Option<String>,
    /// Origin of the response service, passed to every backend call.
    pub base_url: String,
    /// Page the survey is shown on, recorded in response metadata.
    pub page_url: Option<String>,
    /// Query parameters keyed by question id, candidates for prefilling.
    pub prefill: BTreeMap<String, String>,
    pub redirect_delay: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            preview: false,
            user_id: None,
            language: None,
            base_url: String::new(),
            page_url: None,
            prefill: BTreeMap::new(),
            redirect_delay: REDIRECT_DELAY,
        }
    }
}

impl PlayerOptions {
    /// Reads options from the page URL the survey was opened with.
    ///
    /// `preview=true` enables preview mode, `userId` names the respondent
    /// (ignored in preview), `lang` picks the language, and every other
    /// parameter is kept as a prefill candidate.
    pub fn from_url(url: &Url) -> Self {
        let mut options = PlayerOptions {
            base_url: url.origin().ascii_serialization(),
            page_url: Some(url.to_string()),
            ..PlayerOptions::default()
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                PREVIEW_PARAM => options.preview = value == "true",
                USER_ID_PARAM => options.user_id = Some(value.into_owned()),
                LANGUAGE_PARAM => options.language = Some(value.into_owned()),
                _ => {
                    options
                        .prefill
                        .entry(key.into_owned())
                        .or_insert_with(|| value.into_owned());
                }
            }
        }
        if options.preview {
            options.user_id = None;
        }
        options
    }

    /// Parses `raw` as a URL first; see [`PlayerOptions::from_url`].
    pub fn from_url_str(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(|url| Self::from_url(&url))
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_query_parameters() {
        let options = PlayerOptions::from_url_str(
            "https://app.example.com/s/abc?userId=u1&lang=de&q1=Hello%20there&q1=ignored",
        )
        .expect("url");
        assert!(!options.preview);
        assert_eq!(options.user_id.as_deref(), Some("u1"));
        assert_eq!(options.language.as_deref(), Some("de"));
        assert_eq!(options.base_url, "https://app.example.com");
        assert_eq!(
            options.prefill.get("q1").map(String::as_str),
            Some("Hello there")
        );
    }

    #[test]
    fn preview_drops_the_user() {
        let options =
            PlayerOptions::from_url_str("https://app.example.com/s/abc?preview=true&userId=u1")
                .expect("url");
        assert!(options.preview);
        assert!(options.user_id.is_none());
    }
}
