use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_EXECUTABLES: [&str; 5] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const SYSTEM_TESSDATA: [&str; 7] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory for storing downloaded trained data
pub fn get_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ldplayer-bot")
        .join("tessdata")
}

fn responds_to_version(executable: &Path) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: explicit override, then PATH, then
/// common install locations.
pub fn find_tesseract_executable(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() || responds_to_version(path) {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured Tesseract not found: {}", path.display()));
    }

    // Check PATH
    let on_path = PathBuf::from("tesseract");
    if responds_to_version(&on_path) {
        return Ok(on_path);
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
pub fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    let file = format!("{language}.traineddata");

    let local = get_tessdata_dir();
    if local.join(&file).exists() {
        return Some(local);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        for candidate in [prefix.clone(), prefix.join("tessdata")] {
            if candidate.join(&file).exists() {
                return Some(candidate);
            }
        }
    }

    SYSTEM_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join(&file).exists())
}

/// Ensures Tesseract and the trained data for `language` are available,
/// downloading the trained data if necessary.
pub fn ensure_tesseract(override_path: Option<&Path>, language: &str) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(override_path)?;
    info!("Tesseract found at: {}", executable.display());

    if let Some(tessdata) = find_tessdata_dir(language) {
        info!("Using tessdata from: {}", tessdata.display());
        return Ok(TesseractPaths {
            executable,
            tessdata,
        });
    }

    let tessdata = get_tessdata_dir();
    fs::create_dir_all(&tessdata)
        .with_context(|| format!("Failed to create {}", tessdata.display()))?;
    download_tessdata(&tessdata, language)?;

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads trained data for one language
fn download_tessdata(tessdata_dir: &Path, language: &str) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, language);
    let path = tessdata_dir.join(format!("{language}.traineddata"));

    info!("Downloading {}.traineddata...", language);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "ldplayer-bot")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            language,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&path)?;
    file.write_all(&bytes)?;

    info!("Downloaded {}.traineddata ({} bytes)", language, bytes.len());

    Ok(())
}
