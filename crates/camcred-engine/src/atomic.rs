use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Write content atomically: write to a sibling temp file, fsync, rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = sibling_temp(path);

    let written = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("cannot write temp file for {}", path.display()));
    }

    replace_with_temp(&temp_path, path)
}

/// Move a file, copying across filesystems when a rename is not possible.
///
/// The destination is replaced atomically in both cases.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let temp_path = sibling_temp(to);
    if let Err(e) = fs::copy(from, &temp_path).and_then(|_| File::open(&temp_path)?.sync_all()) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("cannot copy {} to {}", from.display(), to.display()));
    }
    replace_with_temp(&temp_path, to)?;
    fs::remove_file(from).with_context(|| format!("cannot remove {}", from.display()))
}

fn replace_with_temp(temp_path: &Path, path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(temp_path, path) {
        let _ = fs::remove_file(temp_path);
        return Err(e).with_context(|| format!("cannot rename temp to {}", path.display()));
    }
    Ok(())
}

fn sibling_temp(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or(Path::new("."));
    dir.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()))
}
