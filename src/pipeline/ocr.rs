use std::path::PathBuf;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("unable to run the OCR engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("OCR engine exited with {code:?}: {stderr}")]
    Engine { code: Option<i32>, stderr: String },
}

/// Black-box text extraction from an image. The engine is external; the
/// pipeline only cares about getting a description string back.
#[allow(async_fn_in_trait)]
pub trait TextRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Shells out to the `tesseract` CLI, tuned to the source language.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    language: String,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let path = scratch_path();
        tokio::fs::write(&path, image).await?;

        let output = Command::new("tesseract")
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .output()
            .await;

        // The scratch file must not outlive the call, even on engine failure.
        let _ = tokio::fs::remove_file(&path).await;

        let output = output?;
        if !output.status.success() {
            return Err(OcrError::Engine {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn scratch_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("obit-watch-{}-{nanos}.img", std::process::id()))
}
