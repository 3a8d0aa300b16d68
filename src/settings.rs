use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::SourceError;

/// Navigation target forced onto template instances. Templates receive their
/// content by injection, so the real URL is never navigated to.
pub const TEMPLATE_PLACEHOLDER_URL: &str = "http://absolute";

/// Three-state feature switch used by the settings merge.
///
/// `Unset` means "inherit from the base settings"; it is never interpreted
/// as `Disabled`, so a partially populated override cannot silently turn a
/// feature off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Toggle {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl Toggle {
    /// Merge two toggles, the explicitly-set side winning.
    pub fn or(self, base: Toggle) -> Toggle {
        match self {
            Toggle::Unset => base,
            set => set,
        }
    }

    fn require(self, name: &'static str) -> Result<bool, SourceError> {
        match self {
            Toggle::Enabled => Ok(true),
            Toggle::Disabled => Ok(false),
            Toggle::Unset => Err(SourceError::MissingSetting(name)),
        }
    }
}

/// Flattened engine feature toggles, font families and font sizes.
///
/// Mirrors the per-instance settings the engine accepts at creation time.
/// Every field follows the unset-inherits rule of [`Toggle`] or `Option`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceOverrides {
    // Scripting
    pub javascript: Toggle,
    pub javascript_access_clipboard: Toggle,
    pub javascript_close_windows: Toggle,
    pub javascript_dom_paste: Toggle,
    pub javascript_open_windows: Toggle,

    // Storage
    pub local_storage: Toggle,
    pub databases: Toggle,
    pub application_cache: Toggle,

    // Rendering
    pub webgl: Toggle,
    pub plugins: Toggle,
    pub java: Toggle,
    pub image_loading: Toggle,
    pub image_shrink_standalone_to_fit: Toggle,
    pub remote_fonts: Toggle,

    // Security
    pub web_security: Toggle,
    pub file_access_from_file_urls: Toggle,
    pub universal_access_from_file_urls: Toggle,

    pub caret_browsing: Toggle,

    // Font families
    pub standard_font_family: Option<String>,
    pub fixed_font_family: Option<String>,
    pub serif_font_family: Option<String>,
    pub sans_serif_font_family: Option<String>,
    pub cursive_font_family: Option<String>,
    pub fantasy_font_family: Option<String>,

    // Font sizes
    pub default_font_size: Option<u32>,
    pub default_fixed_font_size: Option<u32>,
    pub minimum_font_size: Option<u32>,
    pub minimum_logical_font_size: Option<u32>,

    pub default_encoding: Option<String>,
}

/// Caller-facing settings for one browser source.
///
/// Used both as the process-wide default snapshot (see
/// [`SourceSettings::base_defaults`]) and as the per-instance override,
/// where any populated field wins over the base during [`resolve`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Target windowless frame rate.
    pub fps: Option<u32>,
    /// Navigation target. May be absent when `markup` is supplied.
    pub url: Option<String>,
    /// Inline markup served by injection instead of navigation.
    pub markup: Option<String>,
    /// Stylesheet injected into the main frame once it finishes loading.
    pub css: Option<String>,
    pub muted: Option<bool>,
    pub volume: Option<f32>,
    /// Template instances load content by injection; their navigation
    /// target is forced to [`TEMPLATE_PLACEHOLDER_URL`].
    pub is_applying_template: bool,
    pub features: InstanceOverrides,
}

impl SourceSettings {
    /// The fully-populated process-wide default snapshot. Resolving against
    /// this base can only fail when neither side supplies a content source.
    pub fn base_defaults() -> Self {
        Self {
            width: Some(800),
            height: Some(600),
            fps: Some(30),
            url: None,
            markup: None,
            css: Some(String::new()),
            muted: Some(false),
            volume: Some(1.0),
            is_applying_template: false,
            features: InstanceOverrides {
                javascript: Toggle::Enabled,
                javascript_access_clipboard: Toggle::Disabled,
                javascript_close_windows: Toggle::Disabled,
                javascript_dom_paste: Toggle::Disabled,
                javascript_open_windows: Toggle::Disabled,
                local_storage: Toggle::Enabled,
                databases: Toggle::Enabled,
                application_cache: Toggle::Enabled,
                webgl: Toggle::Enabled,
                plugins: Toggle::Enabled,
                // The engine still accepts the long-deprecated applet
                // toggle; nothing should turn it on by default.
                java: Toggle::Disabled,
                image_loading: Toggle::Enabled,
                image_shrink_standalone_to_fit: Toggle::Enabled,
                remote_fonts: Toggle::Enabled,
                web_security: Toggle::Enabled,
                file_access_from_file_urls: Toggle::Disabled,
                universal_access_from_file_urls: Toggle::Disabled,
                caret_browsing: Toggle::Disabled,
                standard_font_family: Some("Times New Roman".to_string()),
                fixed_font_family: Some("Courier New".to_string()),
                serif_font_family: Some("Times New Roman".to_string()),
                sans_serif_font_family: Some("Arial".to_string()),
                cursive_font_family: Some("Comic Sans MS".to_string()),
                fantasy_font_family: Some("Impact".to_string()),
                default_font_size: Some(16),
                default_fixed_font_size: Some(13),
                minimum_font_size: Some(0),
                minimum_logical_font_size: Some(6),
                default_encoding: Some("ISO-8859-1".to_string()),
            },
        }
    }
}

/// Fully resolved engine feature set. No unset states remain.
#[derive(Clone, Debug, PartialEq)]
pub struct BrowserFeatures {
    pub javascript: bool,
    pub javascript_access_clipboard: bool,
    pub javascript_close_windows: bool,
    pub javascript_dom_paste: bool,
    pub javascript_open_windows: bool,
    pub local_storage: bool,
    pub databases: bool,
    pub application_cache: bool,
    pub webgl: bool,
    pub plugins: bool,
    pub java: bool,
    pub image_loading: bool,
    pub image_shrink_standalone_to_fit: bool,
    pub remote_fonts: bool,
    pub web_security: bool,
    pub file_access_from_file_urls: bool,
    pub universal_access_from_file_urls: bool,
    pub caret_browsing: bool,
    pub standard_font_family: String,
    pub fixed_font_family: String,
    pub serif_font_family: String,
    pub sans_serif_font_family: String,
    pub cursive_font_family: String,
    pub fantasy_font_family: String,
    pub default_font_size: u32,
    pub default_fixed_font_size: u32,
    pub minimum_font_size: u32,
    pub minimum_logical_font_size: u32,
    pub default_encoding: String,
}

/// Immutable per-instance configuration snapshot.
///
/// Built once by [`resolve`] before creation starts; never mutated
/// afterwards. Replacing the browser requires a fresh snapshot and a fresh
/// instance.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Navigation target the engine is pointed at.
    pub url: Url,
    /// Inline markup delivered by injection, if this is a markup instance.
    pub markup: Option<String>,
    pub css: String,
    pub muted: bool,
    pub volume: f32,
    pub features: BrowserFeatures,
}

fn pick<T: Clone>(
    overriding: &Option<T>,
    base: &Option<T>,
    name: &'static str,
) -> Result<T, SourceError> {
    overriding
        .as_ref()
        .or(base.as_ref())
        .cloned()
        .ok_or(SourceError::MissingSetting(name))
}

/// Merge the process-wide `base` snapshot with the caller-supplied
/// `overrides` into one immutable [`EffectiveConfig`].
///
/// Any populated override field wins; unset fields inherit the base value.
/// Fails fast with [`SourceError::MissingSetting`] when a required field is
/// absent from both sides; no partial config is ever produced.
pub fn resolve(
    base: &SourceSettings,
    overrides: &SourceSettings,
) -> Result<EffectiveConfig, SourceError> {
    // Snapshot the base so a concurrent resolution never observes it
    // half-merged.
    let base = base.clone();

    let markup = overrides.markup.clone().or(base.markup.clone());
    let is_template = overrides.is_applying_template || base.is_applying_template;

    let url = if is_template {
        Url::parse(TEMPLATE_PLACEHOLDER_URL)?
    } else {
        match overrides.url.as_ref().or(base.url.as_ref()) {
            Some(raw) => Url::parse(raw)?,
            // Markup instances never navigate anywhere real.
            None if markup.is_some() => Url::parse(TEMPLATE_PLACEHOLDER_URL)?,
            None => return Err(SourceError::MissingSetting("url")),
        }
    };

    let f = &overrides.features;
    let bf = &base.features;

    Ok(EffectiveConfig {
        width: pick(&overrides.width, &base.width, "width")?,
        height: pick(&overrides.height, &base.height, "height")?,
        fps: pick(&overrides.fps, &base.fps, "fps")?,
        url,
        markup,
        css: pick(&overrides.css, &base.css, "css")?,
        muted: pick(&overrides.muted, &base.muted, "muted")?,
        volume: pick(&overrides.volume, &base.volume, "volume")?,
        features: BrowserFeatures {
            javascript: f.javascript.or(bf.javascript).require("javascript")?,
            javascript_access_clipboard: f
                .javascript_access_clipboard
                .or(bf.javascript_access_clipboard)
                .require("javascript_access_clipboard")?,
            javascript_close_windows: f
                .javascript_close_windows
                .or(bf.javascript_close_windows)
                .require("javascript_close_windows")?,
            javascript_dom_paste: f
                .javascript_dom_paste
                .or(bf.javascript_dom_paste)
                .require("javascript_dom_paste")?,
            javascript_open_windows: f
                .javascript_open_windows
                .or(bf.javascript_open_windows)
                .require("javascript_open_windows")?,
            local_storage: f.local_storage.or(bf.local_storage).require("local_storage")?,
            databases: f.databases.or(bf.databases).require("databases")?,
            application_cache: f
                .application_cache
                .or(bf.application_cache)
                .require("application_cache")?,
            webgl: f.webgl.or(bf.webgl).require("webgl")?,
            plugins: f.plugins.or(bf.plugins).require("plugins")?,
            java: f.java.or(bf.java).require("java")?,
            image_loading: f.image_loading.or(bf.image_loading).require("image_loading")?,
            image_shrink_standalone_to_fit: f
                .image_shrink_standalone_to_fit
                .or(bf.image_shrink_standalone_to_fit)
                .require("image_shrink_standalone_to_fit")?,
            remote_fonts: f.remote_fonts.or(bf.remote_fonts).require("remote_fonts")?,
            web_security: f.web_security.or(bf.web_security).require("web_security")?,
            file_access_from_file_urls: f
                .file_access_from_file_urls
                .or(bf.file_access_from_file_urls)
                .require("file_access_from_file_urls")?,
            universal_access_from_file_urls: f
                .universal_access_from_file_urls
                .or(bf.universal_access_from_file_urls)
                .require("universal_access_from_file_urls")?,
            caret_browsing: f.caret_browsing.or(bf.caret_browsing).require("caret_browsing")?,
            standard_font_family: pick(
                &f.standard_font_family,
                &bf.standard_font_family,
                "standard_font_family",
            )?,
            fixed_font_family: pick(&f.fixed_font_family, &bf.fixed_font_family, "fixed_font_family")?,
            serif_font_family: pick(&f.serif_font_family, &bf.serif_font_family, "serif_font_family")?,
            sans_serif_font_family: pick(
                &f.sans_serif_font_family,
                &bf.sans_serif_font_family,
                "sans_serif_font_family",
            )?,
            cursive_font_family: pick(
                &f.cursive_font_family,
                &bf.cursive_font_family,
                "cursive_font_family",
            )?,
            fantasy_font_family: pick(
                &f.fantasy_font_family,
                &bf.fantasy_font_family,
                "fantasy_font_family",
            )?,
            default_font_size: pick(&f.default_font_size, &bf.default_font_size, "default_font_size")?,
            default_fixed_font_size: pick(
                &f.default_fixed_font_size,
                &bf.default_fixed_font_size,
                "default_fixed_font_size",
            )?,
            minimum_font_size: pick(&f.minimum_font_size, &bf.minimum_font_size, "minimum_font_size")?,
            minimum_logical_font_size: pick(
                &f.minimum_logical_font_size,
                &bf.minimum_logical_font_size,
                "minimum_logical_font_size",
            )?,
            default_encoding: pick(&f.default_encoding, &bf.default_encoding, "default_encoding")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with_url() -> SourceSettings {
        let mut base = SourceSettings::base_defaults();
        base.url = Some("http://base.example/".to_string());
        base
    }

    #[test]
    fn empty_override_inherits_every_base_value() {
        let base = base_with_url();
        let cfg = resolve(&base, &SourceSettings::default()).unwrap();

        assert_eq!(cfg.width, 800);
        assert_eq!(cfg.height, 600);
        assert_eq!(cfg.fps, 30);
        assert_eq!(cfg.url.as_str(), "http://base.example/");
        assert_eq!(cfg.css, "");
        assert!(!cfg.muted);
        assert_eq!(cfg.volume, 1.0);
        assert!(cfg.features.javascript);
        assert!(!cfg.features.caret_browsing);
        assert!(!cfg.features.java);
        assert_eq!(cfg.features.standard_font_family, "Times New Roman");
        assert_eq!(cfg.features.default_font_size, 16);
    }

    #[test]
    fn populated_override_wins_on_every_field() {
        let overrides = SourceSettings {
            width: Some(1920),
            height: Some(1080),
            fps: Some(60),
            url: Some("http://override.example/page".to_string()),
            css: Some("body { background: transparent; }".to_string()),
            muted: Some(true),
            volume: Some(0.25),
            features: InstanceOverrides {
                javascript: Toggle::Disabled,
                webgl: Toggle::Disabled,
                java: Toggle::Enabled,
                standard_font_family: Some("Verdana".to_string()),
                default_font_size: Some(20),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = resolve(&base_with_url(), &overrides).unwrap();
        assert_eq!(cfg.width, 1920);
        assert_eq!(cfg.height, 1080);
        assert_eq!(cfg.fps, 60);
        assert_eq!(cfg.url.as_str(), "http://override.example/page");
        assert!(cfg.muted);
        assert_eq!(cfg.volume, 0.25);
        assert!(!cfg.features.javascript);
        assert!(!cfg.features.webgl);
        assert!(cfg.features.java);
        assert_eq!(cfg.features.standard_font_family, "Verdana");
        assert_eq!(cfg.features.default_font_size, 20);
        // Untouched fields still inherit.
        assert!(cfg.features.local_storage);
        assert_eq!(cfg.features.fixed_font_family, "Courier New");
    }

    #[test]
    fn partial_override_keeps_base_for_unset_fields() {
        let overrides = SourceSettings {
            width: Some(1280),
            features: InstanceOverrides {
                plugins: Toggle::Disabled,
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = resolve(&base_with_url(), &overrides).unwrap();
        assert_eq!(cfg.width, 1280);
        assert_eq!(cfg.height, 600);
        assert!(!cfg.features.plugins);
        assert!(cfg.features.javascript);
    }

    #[test]
    fn unset_toggle_never_disables() {
        assert_eq!(Toggle::Unset.or(Toggle::Enabled), Toggle::Enabled);
        assert_eq!(Toggle::Unset.or(Toggle::Disabled), Toggle::Disabled);
        assert_eq!(Toggle::Enabled.or(Toggle::Disabled), Toggle::Enabled);
        assert_eq!(Toggle::Disabled.or(Toggle::Enabled), Toggle::Disabled);
        assert_eq!(Toggle::Unset.or(Toggle::Unset), Toggle::Unset);
    }

    #[test]
    fn template_instances_force_the_placeholder_url() {
        let overrides = SourceSettings {
            url: Some("http://ignored.example/".to_string()),
            is_applying_template: true,
            ..Default::default()
        };

        let cfg = resolve(&base_with_url(), &overrides).unwrap();
        assert_eq!(cfg.url.as_str(), "http://absolute/");
    }

    #[test]
    fn markup_instances_without_url_get_the_placeholder() {
        let overrides = SourceSettings {
            markup: Some("<h1>hello</h1>".to_string()),
            ..Default::default()
        };

        let mut base = SourceSettings::base_defaults();
        base.url = None;
        let cfg = resolve(&base, &overrides).unwrap();
        assert_eq!(cfg.url.as_str(), "http://absolute/");
        assert_eq!(cfg.markup.as_deref(), Some("<h1>hello</h1>"));
    }

    #[test]
    fn missing_url_on_both_sides_fails_fast() {
        let base = SourceSettings::base_defaults();
        let err = resolve(&base, &SourceSettings::default()).unwrap_err();
        assert!(matches!(err, SourceError::MissingSetting("url")));
    }

    #[test]
    fn missing_toggle_on_both_sides_fails_fast() {
        let mut base = base_with_url();
        base.features.webgl = Toggle::Unset;
        let err = resolve(&base, &SourceSettings::default()).unwrap_err();
        assert!(matches!(err, SourceError::MissingSetting("webgl")));
    }

    #[test]
    fn invalid_url_is_reported() {
        let overrides = SourceSettings {
            url: Some("not a url".to_string()),
            ..Default::default()
        };
        let err = resolve(&base_with_url(), &overrides).unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }

    #[test]
    fn overrides_deserialize_from_partial_json() {
        let overrides: SourceSettings = serde_json::from_str(
            r#"{
                "width": 1280,
                "height": 720,
                "url": "http://example.com/",
                "features": { "javascript": "Disabled" }
            }"#,
        )
        .unwrap();

        assert_eq!(overrides.width, Some(1280));
        assert_eq!(overrides.features.javascript, Toggle::Disabled);
        assert_eq!(overrides.features.webgl, Toggle::Unset);

        let cfg = resolve(&SourceSettings::base_defaults(), &overrides).unwrap();
        assert_eq!((cfg.width, cfg.height), (1280, 720));
        assert!(!cfg.features.javascript);
    }
}
