//! External index gateway: enumerating smart folders and their contents

use crate::error::SmartFoldersError;
use crate::folder::SmartFolder;
use std::path::Path;
use std::process::Command;

/// The slow external file-index queries. Implementations may take seconds,
/// so these are only ever invoked from background refresh actions, never on
/// the request path.
pub trait IndexGateway: Send + Sync {
    /// All smart folders currently known to the index.
    fn discover_folders(&self) -> crate::Result<Vec<SmartFolder>>;

    /// The file paths one smart folder currently resolves to.
    fn list_contents(&self, folder_path: &str) -> crate::Result<Vec<String>>;
}

/// Spotlight-backed gateway shelling out to `mdfind`.
pub struct MdfindGateway;

impl MdfindGateway {
    fn run(args: &[&str]) -> crate::Result<Vec<String>> {
        let output = Command::new("mdfind").args(args).output()?;
        if !output.status.success() {
            return Err(SmartFoldersError::Gateway(format!(
                "mdfind {:?} exited with {}",
                args, output.status
            )));
        }
        let stdout = String::from_utf8(output.stdout).map_err(|err| {
            SmartFoldersError::Gateway(format!("mdfind output is not UTF-8: {}", err))
        })?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

impl IndexGateway for MdfindGateway {
    fn discover_folders(&self) -> crate::Result<Vec<SmartFolder>> {
        let paths = Self::run(&["kind:saved search"])?;
        Ok(paths.into_iter().map(SmartFolder::from_path).collect())
    }

    fn list_contents(&self, folder_path: &str) -> crate::Result<Vec<String>> {
        // mdfind -s resolves a saved search by name, so derive it from the
        // path's file stem.
        let name = Path::new(folder_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder_path.to_string());
        Self::run(&["-s", &name])
    }
}
