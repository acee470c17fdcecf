use web_sys::{Document, HtmlMetaElement, UrlSearchParams, Window};
use wasm_bindgen::JsCast;

use crate::background::{BackgroundOptions, PixelRatio};

pub const DEFAULT_API_ROOT: &str = "http://localhost:8000";
const API_ROOT_META: &str = "visionforge-api-root";

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub api_root: String,
    pub poll_interval_ms: i32,
    pub particle_reseed_debounce_ms: i32,
    pub copied_flash_ms: i32,
    /// `None` disables the decorative background entirely.
    pub background: Option<BackgroundOptions>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            poll_interval_ms: 1500,
            particle_reseed_debounce_ms: 200,
            copied_flash_ms: 2000,
            background: Some(BackgroundOptions::default()),
        }
    }
}

impl ClientConfig {
    /// Reads overrides from the page URL and `<meta>` tags.
    pub fn from_window(window: &Window) -> Self {
        let search = window.location().search().unwrap_or_default();
        let params = UrlSearchParams::new_with_str(&search).ok();
        let param = |name: &str| params.as_ref().and_then(|p| p.get(name));

        let meta = window
            .document()
            .and_then(|document| meta_content(&document, API_ROOT_META));

        Self::from_sources(
            param("api_root").as_deref(),
            meta.as_deref(),
            option_env!("VISIONFORGE_API_ROOT"),
            param("nobg").as_deref(),
            param("bg").as_deref(),
        )
    }

    pub fn from_sources(
        query_root: Option<&str>,
        meta_root: Option<&str>,
        build_root: Option<&str>,
        nobg: Option<&str>,
        bg_variant: Option<&str>,
    ) -> Self {
        let api_root = [query_root, meta_root, build_root]
            .into_iter()
            .flatten()
            .map(normalize_api_root)
            .find(|root| !root.is_empty())
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string());

        let background = match nobg {
            Some("1") | Some("true") => None,
            _ => Some(match bg_variant {
                Some("fixed") => BackgroundOptions {
                    pixel_ratio: PixelRatio::Fixed(2.0),
                    parallax_gain: 1.0,
                    glow: false,
                },
                _ => BackgroundOptions::default(),
            }),
        };

        Self {
            api_root,
            background,
            ..Self::default()
        }
    }
}

pub fn normalize_api_root(root: &str) -> String {
    root.trim().trim_end_matches('/').to_string()
}

fn meta_content(document: &Document, name: &str) -> Option<String> {
    let selector = format!("meta[name=\"{}\"]", name);
    let meta = document
        .query_selector(&selector)
        .ok()??
        .dyn_into::<HtmlMetaElement>()
        .ok()?;
    let content = meta.content();
    if content.trim().is_empty() {
        None
    } else {
        Some(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_localhost() {
        let config = ClientConfig::from_sources(None, None, None, None, None);
        assert_eq!(config.api_root, "http://localhost:8000");
        assert_eq!(config.poll_interval_ms, 1500);
        assert_eq!(config.background, Some(BackgroundOptions::default()));
    }

    #[test]
    fn query_wins_over_meta_and_build_env() {
        let config = ClientConfig::from_sources(
            Some("https://api.example.com/"),
            Some("https://meta.example.com"),
            Some("https://build.example.com"),
            None,
            None,
        );
        assert_eq!(config.api_root, "https://api.example.com");
    }

    #[test]
    fn blank_sources_fall_through() {
        let config = ClientConfig::from_sources(
            Some("  "),
            None,
            Some("https://build.example.com//"),
            None,
            None,
        );
        assert_eq!(config.api_root, "https://build.example.com");
    }

    #[test]
    fn background_switches() {
        let off = ClientConfig::from_sources(None, None, None, Some("1"), None);
        assert_eq!(off.background, None);

        let fixed = ClientConfig::from_sources(None, None, None, None, Some("fixed"));
        let options = fixed.background.unwrap();
        assert_eq!(options.pixel_ratio, PixelRatio::Fixed(2.0));
        assert!(!options.glow);
    }
}
