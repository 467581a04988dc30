use std::collections::HashSet;
use std::sync::LazyLock;

use tracing::debug;
use url::Url;

/// Hosts recognised as music links when the config doesn't override them.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "open.spotify.com",
    "www.spotify.com",
    "music.youtube.com",
    "www.youtube.com",
    "youtu.be",
    "soundcloud.com",
    "www.soundcloud.com",
    "music.apple.com",
    "www.apple.com",
];

static URL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*\\(),]|%[0-9a-fA-F]{2})+")
        .expect("valid regex")
});

/// Finds the first URL in a message and accepts it only when its host is
/// on the allow-list. The host set is fixed once built.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    hosts: HashSet<String>,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS.iter().copied())
    }
}

impl LinkExtractor {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_lowercase())
    }

    /// Returns the leftmost URL in `text` if it points at an allow-listed host.
    /// Only the first URL is ever looked at; later ones are ignored even if
    /// the first is rejected.
    pub fn extract(&self, text: &str) -> Option<String> {
        let candidate = URL_RE.find(text)?.as_str();

        let parsed = match Url::parse(candidate) {
            Ok(u) => u,
            Err(e) => {
                debug!("Discarding unparsable URL {}: {}", candidate, e);
                return None;
            }
        };

        let host = parsed.host_str()?;
        if self.is_allowed_host(host) {
            Some(candidate.to_string())
        } else {
            debug!("Host {} is not a recognised music service", host);
            None
        }
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_spotify_link_from_sentence() {
        let extractor = LinkExtractor::default();
        assert_eq!(
            extractor.extract("check this https://open.spotify.com/track/abc"),
            Some("https://open.spotify.com/track/abc".to_string())
        );
    }

    #[test]
    fn test_plain_text_is_not_found() {
        let extractor = LinkExtractor::default();
        assert_eq!(extractor.extract("no links in here, just vibes"), None);
        assert_eq!(extractor.extract(""), None);
    }

    #[test]
    fn test_unlisted_host_is_rejected() {
        let extractor = LinkExtractor::default();
        assert_eq!(extractor.extract("read https://example.com/article"), None);
        assert_eq!(
            extractor.extract("https://open.spotify.com.evil.net/track/abc"),
            None
        );
        assert_eq!(extractor.extract("https://evil.net/open.spotify.com"), None);
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        let extractor = LinkExtractor::default();
        let text = "loud: https://Open.Spotify.COM/track/abc";
        assert_eq!(
            extractor.extract(text),
            Some("https://Open.Spotify.COM/track/abc".to_string())
        );
    }

    #[test]
    fn test_only_leftmost_url_is_considered() {
        let extractor = LinkExtractor::default();

        let both_music = "https://youtu.be/xyz and https://open.spotify.com/track/abc";
        assert_eq!(
            extractor.extract(both_music),
            Some("https://youtu.be/xyz".to_string())
        );

        let other_first = "https://example.com then https://open.spotify.com/track/abc";
        assert_eq!(extractor.extract(other_first), None);
    }

    #[test]
    fn test_query_string_is_kept() {
        let extractor = LinkExtractor::default();
        assert_eq!(
            extractor.extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42 nice"),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42".to_string())
        );
    }

    #[test]
    fn test_plain_http_is_accepted() {
        let extractor = LinkExtractor::default();
        assert_eq!(
            extractor.extract("http://soundcloud.com/artist/track"),
            Some("http://soundcloud.com/artist/track".to_string())
        );
    }

    #[test]
    fn test_custom_hosts_are_normalised() {
        let extractor = LinkExtractor::new(["  Tidal.com ", ""]);
        assert_eq!(extractor.host_count(), 1);
        assert!(extractor.is_allowed_host("tidal.com"));
        assert_eq!(
            extractor.extract("https://tidal.com/browse/track/1"),
            Some("https://tidal.com/browse/track/1".to_string())
        );
        assert_eq!(extractor.extract("https://open.spotify.com/track/abc"), None);
    }
}
