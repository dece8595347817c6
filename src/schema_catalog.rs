use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;

/// Environment variable that relocates the schema directory when no
/// explicit override is set.
pub const SCHEMA_PATH_VAR: &str = "PNML_PATH";

static SCHEMA_PATH_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/**
 * The directory net names are resolved against. Precedence: the explicit
 * override set through set_schema_path, then the PNML_PATH environment
 * variable, then the built-in `schemata` directory next to the crate.
 */
pub fn schema_path() -> PathBuf {
    if let Some(dir) = SCHEMA_PATH_OVERRIDE.read().as_ref() {
        return dir.clone();
    }
    if let Some(dir) = env::var_os(SCHEMA_PATH_VAR) {
        return PathBuf::from(dir);
    }
    default_schema_path()
}

fn default_schema_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("schemata")
}

/// Override the schema directory process-wide.
pub fn set_schema_path(dir: impl Into<PathBuf>) {
    let dir = dir.into();
    log::info!("schema path set to {}", dir.display());
    *SCHEMA_PATH_OVERRIDE.write() = Some(dir);
}

/// Drop the override; schema_path falls back to PNML_PATH or the default.
pub fn reset_schema_path() {
    *SCHEMA_PATH_OVERRIDE.write() = None;
}

/// Build the schema filename for a net name.
pub fn schema_to_file(name: &str) -> PathBuf {
    schema_path().join(format!("{}.xml", name))
}

/// List the schema files of the catalog, sorted by path.
pub fn schema_files() -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(schema_path())?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|extension| extension == "xml"))
        .collect();
    files.sort();
    Ok(files)
}

/// List the net names available in the catalog.
pub fn schema_list() -> io::Result<Vec<String>> {
    Ok(schema_files()?
        .iter()
        .filter_map(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .collect())
}

/// Serializes tests that touch the process-wide schema path.
#[cfg(test)]
pub(crate) fn tests_lock() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
    LOCK.lock()
}
