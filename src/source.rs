use crate::constants::{ARCHIVE_EXTENSION, MAX_MEMBER_PREALLOC};
use crate::errors::{AppError, AppResult, UnitFailure};
use crate::models::{InputFormat, WorkUnit};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::vec;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// What the work source yields per archive member: a unit ready for extraction,
/// or the failure that prevented reading it.
pub type SourceItem = Result<WorkUnit, UnitFailure>;

/// Lists the `.zip` files directly inside `dir`, sorted by file name.
///
/// Nested directories and files with other extensions are ignored.
///
/// # Errors
///
/// Returns `SourceUnavailable` if `dir` does not exist, is not a directory, or
/// cannot be read.
pub fn list_archives(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let unavailable = |reason: String| AppError::SourceUnavailable {
        path: dir.display().to_string(),
        reason,
    };

    let metadata = std::fs::metadata(dir).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }

    // Pre-allocate with conservative estimate (usually tens of archives)
    let mut archives = Vec::with_capacity(64);
    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| unavailable(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_archive = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
            .unwrap_or(false);
        if is_archive {
            archives.push(entry.into_path());
        }
    }

    Ok(archives)
}

/// A file member of an archive, addressed by its central-directory position.
///
/// Names are not unique in the zip format, so reads go through `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub index: usize,
    pub name: String,
}

/// An opened archive exposing its file members.
pub struct ArchiveHandle {
    name: String,
    archive: ZipArchive<BufReader<File>>,
}

impl ArchiveHandle {
    pub fn open(path: &Path) -> Result<Self, ZipError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        Ok(Self {
            name: archive_name(path),
            archive,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File members in central-directory order; directory entries are skipped.
    pub fn list_members(&mut self) -> Result<Vec<ArchiveMember>, ZipError> {
        let mut members = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let member = self.archive.by_index_raw(index)?;
            if !member.is_dir() {
                members.push(ArchiveMember {
                    index,
                    name: member.name().to_string(),
                });
            }
        }
        Ok(members)
    }

    pub fn read_member(&mut self, member: &ArchiveMember) -> Result<Vec<u8>, ZipError> {
        let mut file = self.archive.by_index(member.index)?;
        let mut payload = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut payload)?;
        Ok(payload)
    }
}

/// The declared size comes from the archive header and may be bogus.
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_MEMBER_PREALLOC) as usize
}

fn archive_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Enumerates every accepted member of every archive in a directory.
///
/// The archive list is fixed when the source is opened; [`WorkSource::units`]
/// can be called any number of times and replays the same sequence, reading
/// member bytes lazily as the iterator advances.
#[derive(Debug, Clone)]
pub struct WorkSource {
    dir: PathBuf,
    archives: Vec<PathBuf>,
    format: InputFormat,
}

impl WorkSource {
    pub fn open(dir: &Path, format: InputFormat) -> AppResult<Self> {
        let archives = list_archives(dir)?;
        debug!(
            input_dir = %dir.display(),
            archives = archives.len(),
            "Work source opened"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            archives,
            format,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Starts a fresh pass over all archive members.
    pub fn units(&self) -> WorkUnits {
        WorkUnits {
            archives: self.archives.clone().into_iter(),
            current: None,
            format: self.format,
        }
    }
}

/// Archive currently being drained by [`WorkUnits`].
struct OpenArchive {
    handle: ArchiveHandle,
    members: vec::IntoIter<ArchiveMember>,
}

/// Lazy iterator over the members of a [`WorkSource`].
///
/// Holds at most one open archive and one member payload at a time.
pub struct WorkUnits {
    archives: vec::IntoIter<PathBuf>,
    current: Option<OpenArchive>,
    format: InputFormat,
}

impl Iterator for WorkUnits {
    type Item = SourceItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(open) = self.current.as_mut() {
                match open.members.next() {
                    Some(member) => {
                        let archive = open.handle.name().to_string();
                        let item = match open.handle.read_member(&member) {
                            Ok(payload) => Ok(WorkUnit {
                                archive,
                                member: member.name,
                                payload,
                            }),
                            Err(e) => {
                                warn!(
                                    archive = archive.as_str(),
                                    member = member.name.as_str(),
                                    error = %e,
                                    "Failed to read archive member"
                                );
                                Err(UnitFailure::corrupt_entry(
                                    &archive,
                                    &member.name,
                                    e.to_string(),
                                ))
                            }
                        };
                        return Some(item);
                    }
                    None => self.current = None,
                }
            }

            let path = self.archives.next()?;
            let opened = ArchiveHandle::open(&path)
                .and_then(|mut handle| handle.list_members().map(|members| (handle, members)));
            match opened {
                Ok((handle, members)) => {
                    let members: Vec<ArchiveMember> = members
                        .into_iter()
                        .filter(|m| self.format.accepts_member(&m.name))
                        .collect();
                    debug!(
                        archive = handle.name(),
                        members = members.len(),
                        "Opened archive"
                    );
                    self.current = Some(OpenArchive {
                        handle,
                        members: members.into_iter(),
                    });
                }
                Err(e) => {
                    let name = archive_name(&path);
                    warn!(
                        zip_file = %path.display(),
                        error = %e,
                        "Failed to open ZIP archive"
                    );
                    return Some(Err(UnitFailure::corrupt_entry(
                        &name,
                        "",
                        format!("Failed to read ZIP archive: {e}"),
                    )));
                }
            }
        }
    }
}
