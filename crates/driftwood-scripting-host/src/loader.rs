//! Script discovery
//!
//! A directory holding an `init.lua` is a module: only its entry point is
//! loaded and the rest of it is reached through `require`. Any other
//! directory contributes every `.lua` file and is searched recursively.
//! Linked directories are not followed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// File name marking a directory as a module
pub const MODULE_ENTRY_POINT: &str = "init.lua";

/// Find the scripts to execute under `root`, sorted by path
pub fn discover_scripts(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    collect(root, &mut scripts)?;
    scripts.sort();
    Ok(scripts)
}

fn collect(dir: &Path, scripts: &mut Vec<PathBuf>) -> io::Result<()> {
    let entry_point = dir.join(MODULE_ENTRY_POINT);
    if entry_point.is_file() {
        debug!(target: "scripting", "Found module entry point {}", entry_point.display());
        scripts.push(entry_point);
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            collect(&path, scripts)?;
        } else if file_type.is_symlink() && path.is_dir() {
            // Linked directories can loop back on themselves
            debug!(target: "scripting", "Skipping linked directory {}", path.display());
        } else if is_lua_file(&path) {
            debug!(target: "scripting", "Found script {}", path.display());
            scripts.push(path);
        }
    }

    Ok(())
}

fn is_lua_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("lua")
}

/// `package.path` entries that make modules under `root` requirable
pub fn package_path_entries(root: &Path) -> String {
    let root = root.to_string_lossy();
    format!("{root}/?.lua;{root}/?/init.lua")
}
