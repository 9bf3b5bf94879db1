use std::fs::File;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::{debug, warn};

use super::{OcrEngine, OcrError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// OCR through the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    psm: Option<u32>,
    timeout: Option<Duration>,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            psm: None,
            timeout: None,
        }
    }

    pub fn with_psm(mut self, psm: Option<u32>) -> Self {
        self.psm = psm;
        self
    }

    /// Kill the process and fail with [`OcrError::Timeout`] once a single
    /// recognition runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Languages installed for this tesseract binary.
    pub fn list_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--list-langs")
            .output()
            .map_err(|source| OcrError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut langs = Vec::new();
        for (idx, line) in stdout.lines().enumerate() {
            if idx == 0 {
                continue;
            }
            let value = line.trim();
            if !value.is_empty() {
                langs.push(value.to_string());
            }
        }
        Ok(langs)
    }

    /// Keep the requested `+`-separated languages that are installed.
    ///
    /// Missing languages are reported with a warning; if none is installed
    /// the request is rejected. When the installed list cannot be read the
    /// request is passed through untouched.
    pub fn check_languages(&self, requested: &str) -> Result<String, OcrError> {
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            return Err(OcrError::Language("ocr language is empty".to_string()));
        }

        let available = match self.list_languages() {
            Ok(list) => list,
            Err(err) => {
                debug!("cannot list tesseract languages: {}", err);
                return Ok(trimmed.to_string());
            }
        };

        let mut chosen = Vec::new();
        let mut missing = Vec::new();
        for raw in trimmed.split(['+', ',', ' ']) {
            let lang = raw.trim();
            if lang.is_empty() {
                continue;
            }
            if available.iter().any(|value| value == lang) {
                chosen.push(lang.to_string());
            } else {
                missing.push(lang.to_string());
            }
        }

        if chosen.is_empty() {
            return Err(OcrError::Language(format!(
                "ocr language(s) not available: {} (available: {})",
                missing.join(", "),
                available.join(", ")
            )));
        }
        if !missing.is_empty() {
            warn!(
                "ocr language(s) not available: {} (available: {})",
                missing.join(", "),
                available.join(", ")
            );
        }

        Ok(chosen.join("+"))
    }

    fn wait(&self, mut child: Child) -> Result<ExitStatus, OcrError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, OcrError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("region.png");
        image.save_with_format(&input, image::ImageFormat::Png)?;
        let output_base = dir.path().join("region");
        let stderr_path = dir.path().join("stderr.log");

        let mut command = Command::new(&self.binary);
        command
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(lang)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?));
        if let Some(psm) = self.psm {
            command.arg("--psm").arg(psm.to_string());
        }

        let child = command.spawn().map_err(|source| OcrError::Spawn {
            binary: self.binary.display().to_string(),
            source,
        })?;
        let status = self.wait(child)?;
        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let text = std::fs::read_to_string(output_base.with_extension("txt"))?;
        Ok(text)
    }
}
