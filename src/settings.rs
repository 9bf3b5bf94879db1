use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ocr_lang: String,
    pub ocr_binary: String,
    pub ocr_psm: Option<u32>,
    pub ocr_timeout_secs: u64,
    pub overlay_font_path: Option<String>,
    pub overlay_font_family: Option<String>,
    pub overlay_text_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_lang: "eng".to_string(),
            ocr_binary: "tesseract".to_string(),
            ocr_psm: None,
            ocr_timeout_secs: 60,
            overlay_font_path: None,
            overlay_font_family: None,
            overlay_text_color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    lang: Option<String>,
    binary: Option<String>,
    psm: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_path: Option<String>,
    font_family: Option<String>,
    text_color: Option<String>,
}

/// Load the layered settings, using `$HOME/.boardtt` as the home layer.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let home = home_dir();
    if let Some(home) = home.as_deref() {
        ensure_home_settings_file(home)?;
    }
    load_settings_from(Path::new("."), home.as_deref(), extra_path)
}

/// Load settings from explicit locations: the project layers in `cwd`, the
/// user layers in `home` and an optional extra file that must exist.
pub fn load_settings_from(cwd: &Path, home: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = vec![cwd.join("boardtt.toml"), cwd.join("boardtt.local.toml")];
    if let Some(home) = home {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn ocr_timeout(&self) -> Option<Duration> {
        (self.ocr_timeout_secs > 0).then(|| Duration::from_secs(self.ocr_timeout_secs))
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(lang) = non_blank(ocr.lang) {
                self.ocr_lang = lang;
            }
            if let Some(binary) = non_blank(ocr.binary) {
                self.ocr_binary = binary;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = Some(psm);
            }
            if let Some(secs) = ocr.timeout_secs {
                self.ocr_timeout_secs = secs;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(path) = non_blank(overlay.font_path) {
                self.overlay_font_path = Some(path);
            }
            if let Some(family) = non_blank(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(color) = non_blank(overlay.text_color) {
                self.overlay_text_color = color;
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".boardtt"))
        }
    })
}
