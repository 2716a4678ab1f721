/// Model file provisioning from the HuggingFace hub.
///
/// Fetches the ONNX export and tokenizer of the configured model into the
/// local model directory. Files already present are left alone.
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const HF_BASE: &str = "https://huggingface.co";

/// Files required for the embedder, with their path inside the repository.
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
    ("special_tokens_map.json", "special_tokens_map.json"),
    ("tokenizer_config.json", "tokenizer_config.json"),
];

/// Download URL of `file` in the `main` revision of `repo`.
#[must_use]
pub fn file_url(repo: &str, file: &str) -> String {
    format!("{HF_BASE}/{}/resolve/main/{file}", repo.trim_matches('/'))
}

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Download missing model files of `repo` into `model_dir`.
pub fn download_model_files(repo: &str, model_dir: &Path) -> Result<()> {
    info!("Checking model files in {}", model_dir.display());

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    if all_files_present(model_dir) {
        info!("All model files found, skipping download");
        return Ok(());
    }

    info!("Downloading {repo} from HuggingFace (one-time download)");

    for &(filename, repo_path) in MODEL_FILES {
        let dest = model_dir.join(filename);
        if dest.exists() {
            info!("File already exists: {filename}");
            continue;
        }

        let url = file_url(repo, repo_path);
        info!("Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
    }

    info!("Model download complete");
    Ok(())
}

/// Stream one file to disk with a progress bar.
///
/// Writes to a `.part` file first so an interrupted download is retried on
/// the next run instead of being mistaken for a complete file.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let mut resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let pb = match resp.content_length() {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                    .context("invalid progress template")?
                    .progress_chars("█▓░"),
            );
            pb
        }
        _ => ProgressBar::new_spinner(),
    };

    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("failed to create file: {}", partial.display()))?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = resp.read(&mut buf).context("failed to read response body")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).context("failed to write file")?;
        pb.inc(n as u64);
    }
    file.flush().context("failed to flush file")?;
    drop(file);

    fs::rename(&partial, dest)
        .with_context(|| format!("failed to move download to {}", dest.display()))?;
    pb.finish_and_clear();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        assert_eq!(
            file_url("intfloat/multilingual-e5-small", "onnx/model.onnx"),
            "https://huggingface.co/intfloat/multilingual-e5-small/resolve/main/onnx/model.onnx"
        );
        assert_eq!(
            file_url("/org/model/", "tokenizer.json"),
            "https://huggingface.co/org/model/resolve/main/tokenizer.json"
        );
    }

    #[test]
    fn test_all_files_present_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!all_files_present(dir.path()));
    }

    #[test]
    fn test_all_files_present_complete() {
        let dir = tempfile::tempdir().unwrap();
        for &(name, _) in MODEL_FILES {
            fs::write(dir.path().join(name), "dummy").unwrap();
        }
        assert!(all_files_present(dir.path()));
        // nothing missing, so no network access
        download_model_files("intfloat/multilingual-e5-small", dir.path()).unwrap();
    }

    #[test]
    fn test_all_files_present_partial() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tokenizer.json"), "dummy").unwrap();
        assert!(!all_files_present(dir.path()));
    }
}
