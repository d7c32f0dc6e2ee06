//! WAR archive traversal.
//!
//! Walks the outer archive's entry listing, yields every class file under
//! `WEB-INF/classes/` and recurses into each `WEB-INF/lib/*.jar` nested
//! archive. Emission follows the archive's own entry order; nested archives
//! are drained in the order their containing entries appear. Malformed
//! entries are logged and skipped; only an unreadable outer archive fails
//! the walk.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::warn;
use zip::ZipArchive;

use crate::error::AnalyzeError;

const CLASS_SUFFIX: &str = ".class";
const JAR_SUFFIX: &str = ".jar";
const CLASSES_PREFIX: &str = "WEB-INF/classes/";
const LIB_PREFIX: &str = "WEB-INF/lib/";

/// Where a class entry came from: the outer archive, optionally through a
/// nested library archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassOrigin {
    pub archive: PathBuf,
    pub nested: Option<String>,
}

impl ClassOrigin {
    /// Display label for logs and cache keys, e.g. `app.war!WEB-INF/lib/util.jar`.
    pub fn label(&self) -> String {
        let archive = self
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.archive.display().to_string());
        match &self.nested {
            Some(nested) => format!("{archive}!{nested}"),
            None => archive,
        }
    }
}

/// One class file pulled out of the archive.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub origin: ClassOrigin,
    /// Entry path within its own archive, e.g. `com/ex/UserController.class`
    /// for nested entries, `WEB-INF/classes/com/ex/UserController.class`
    /// for loose ones.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Streaming iterator over the class entries of a WAR file.
///
/// Holds the outer archive handle (a read-only mmap) for its lifetime; the
/// handle is released when the iterator is dropped. Re-open to restart.
pub struct ClassEntries {
    war_path: PathBuf,
    archive: ZipArchive<Cursor<Mmap>>,
    index: usize,
    nested: Option<NestedEntries>,
}

struct NestedEntries {
    name: String,
    archive: ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
}

impl ClassEntries {
    pub fn open(war_path: &Path) -> Result<Self, AnalyzeError> {
        if !war_path.exists() {
            return Err(AnalyzeError::ArchiveNotFound {
                path: war_path.to_path_buf(),
            });
        }

        let file = File::open(war_path)
            .map_err(|e| AnalyzeError::archive_open(war_path, format!("无法打开 war: {e}")))?;
        // SAFETY: The file is opened read-only and the mapping is owned by
        // the returned iterator, which drops it before the file handle.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| AnalyzeError::archive_open(war_path, format!("mmap 失败: {e}")))?;
        let archive = ZipArchive::new(Cursor::new(mmap))
            .map_err(|e| AnalyzeError::archive_open(war_path, format!("无法解析 zip 结构: {e}")))?;

        Ok(Self {
            war_path: war_path.to_path_buf(),
            archive,
            index: 0,
            nested: None,
        })
    }

    pub fn war_path(&self) -> &Path {
        &self.war_path
    }

    fn next_nested(&mut self) -> Option<ClassEntry> {
        let nested = self.nested.as_mut()?;
        while nested.index < nested.archive.len() {
            let index = nested.index;
            nested.index += 1;

            let mut entry = match nested.archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(jar = %nested.name, index, error = %e, "skipping unreadable nested entry");
                    continue;
                }
            };
            if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
                continue;
            }

            let path = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(e) = entry.read_to_end(&mut bytes) {
                warn!(jar = %nested.name, entry = %path, error = %e, "skipping unreadable nested entry");
                continue;
            }

            return Some(ClassEntry {
                origin: ClassOrigin {
                    archive: self.war_path.clone(),
                    nested: Some(nested.name.clone()),
                },
                path,
                bytes,
            });
        }
        self.nested = None;
        None
    }

    fn open_nested(&mut self, name: String, bytes: Vec<u8>) {
        match ZipArchive::new(Cursor::new(bytes)) {
            Ok(archive) => {
                self.nested = Some(NestedEntries {
                    name,
                    archive,
                    index: 0,
                });
            }
            Err(e) => {
                warn!(jar = %name, error = %e, "skipping unreadable nested jar");
            }
        }
    }
}

impl Iterator for ClassEntries {
    type Item = ClassEntry;

    fn next(&mut self) -> Option<ClassEntry> {
        loop {
            if let Some(entry) = self.next_nested() {
                return Some(entry);
            }

            if self.index >= self.archive.len() {
                return None;
            }
            let index = self.index;
            self.index += 1;

            let mut entry = match self.archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(war = %self.war_path.display(), index, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();

            if name.starts_with(CLASSES_PREFIX) && name.ends_with(CLASS_SUFFIX) {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                if let Err(e) = entry.read_to_end(&mut bytes) {
                    warn!(entry = %name, error = %e, "skipping unreadable entry");
                    continue;
                }
                return Some(ClassEntry {
                    origin: ClassOrigin {
                        archive: self.war_path.clone(),
                        nested: None,
                    },
                    path: name,
                    bytes,
                });
            }

            if is_lib_jar(&name) {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                match entry.read_to_end(&mut bytes) {
                    Ok(_) => {
                        drop(entry);
                        self.open_nested(name, bytes);
                    }
                    Err(e) => {
                        warn!(jar = %name, error = %e, "skipping unreadable nested jar");
                    }
                }
            }
        }
    }
}

/// `WEB-INF/lib/*.jar`, one level deep only.
fn is_lib_jar(name: &str) -> bool {
    name.strip_prefix(LIB_PREFIX)
        .is_some_and(|rest| rest.ends_with(JAR_SUFFIX) && !rest.contains('/'))
}
