use crate::error::{RagError, Result};
use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};

/// Creates a directory if it doesn't exist
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    DirBuilder::new().recursive(true).create(path)?;
    Ok(())
}

/// Loads all `.txt` files under a directory, recursively, in path order.
/// Empty files are skipped.
pub fn load_text_files(dir_path: impl AsRef<Path>) -> Result<Vec<String>> {
    let dir_path = dir_path.as_ref();
    if !dir_path.is_dir() {
        return Err(RagError::Config(format!(
            "documents directory {} not found",
            dir_path.display()
        )));
    }

    let mut paths = Vec::new();
    collect_text_paths(dir_path, &mut paths)?;
    paths.sort();

    let mut texts = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let content = content.trim();
        if !content.is_empty() {
            texts.push(content.to_string());
        }
    }
    Ok(texts)
}

fn collect_text_paths(dir_path: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "txt") {
                paths.push(path);
            }
        } else if path.is_dir() {
            collect_text_paths(&path, paths)?;
        }
    }
    Ok(())
}
