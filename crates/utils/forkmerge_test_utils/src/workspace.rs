//! Per-test scratch directories.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

/// A directory owned by a single test.
///
/// The directory lives under `target/forkmerge/` and is named after the
/// package, the module path and the test name. It is wiped when the
/// workspace is created and left in place afterwards for inspection.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Creates an empty workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be recreated.
    pub fn new(pkg_name: &str, module_path: &str, fn_name: &str) -> Result<Self, anyhow::Error> {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let project_root = manifest_dir
            .ancestors()
            .nth(3)
            .context("project root not found")?;

        let mut dir = project_root.join("target").join("forkmerge").join(pkg_name);
        for component in module_path.split("::") {
            dir.push(component);
        }
        dir.push(fn_name);

        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("remove old workspace failed"),
        }
        fs::create_dir_all(&dir).context("create workspace failed")?;

        Ok(Self { dir })
    }

    /// Returns the workspace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the sorted names of the files whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn files_with_prefix(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut names = vec![];
        for entry in fs::read_dir(&self.dir).context("list workspace failed")? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }
}
