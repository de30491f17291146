//! Where the hop file lives.

use std::path::{Path, PathBuf};

/// Fixed name of the hop file inside the hop directory.
pub const HOP_FILENAME: &str = "markov-hops.txt";

/// Overrides the hop directory (the `markov.hopfile.location` setting).
pub const HOP_DIR_ENV: &str = "MARKOV_HOPFILE_LOCATION";

/// Hop directory: `explicit`, else `$MARKOV_HOPFILE_LOCATION`, else the
/// directory holding the running executable, else the working directory.
pub fn resolve_hop_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os(HOP_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    install_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Full path of the hop file under the resolved directory.
pub fn resolve_hop_file(explicit_dir: Option<&Path>) -> PathBuf {
    resolve_hop_dir(explicit_dir).join(HOP_FILENAME)
}

fn install_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let path = resolve_hop_file(Some(Path::new("/opt/router")));
        assert_eq!(path, PathBuf::from("/opt/router/markov-hops.txt"));
    }

    #[test]
    fn default_file_name_is_fixed() {
        assert!(resolve_hop_file(None).ends_with(HOP_FILENAME));
    }
}
