//! `DroidRunner` sub-crate to open APK files and extract the assets the
//! runtime consumes: `classes*.dex`, the binary manifest, the resources
//! table, and the raw resource files.
//!
//! Opening an APK yields a [`Session`] owning a scratch directory with
//! the extracted entries. The caller releases it with [`Session::close`];
//! dropping the session without closing cleans up best-effort.

mod helpers;

pub mod errors;

use crate::errors::{PackageError, PackageResult};
use dr_dex::Dex;
use dr_resources::manifest::{self, Manifest};
use dr_resources::tables::ResourceTable;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use zip::ZipArchive;

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// An extraction session over one APK. All decoded models live in
/// memory; raw entries are materialized under the scratch directory.
#[derive(Debug)]
pub struct Session {
    name: String,
    scratch: PathBuf,
    dexs: Vec<Dex>,
    manifest: Option<Manifest>,
    resources: Option<ResourceTable>,
    entries: BTreeMap<PathBuf, usize>,
    closed: bool,
}

impl Session {
    /// Opens the given APK with default options (everything parsed).
    pub fn open<P: AsRef<Path>>(path: P) -> PackageResult<Self> {
        Options::default().open(path)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scratch directory owned by this session.
    #[inline]
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    /// Dex files in `classes.dex`, `classes2.dex`, ... order.
    #[inline]
    pub fn iter_dexs(&self) -> impl Iterator<Item = &Dex> {
        self.dexs.iter()
    }

    #[inline]
    #[must_use]
    pub fn nb_dexs(&self) -> usize {
        self.dexs.len()
    }

    #[inline]
    #[must_use]
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn resources(&self) -> Option<&ResourceTable> {
        self.resources.as_ref()
    }

    /// Returns an iterator over entry names and sizes contained in the
    /// package.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&Path, usize)> {
        self.entries
            .iter()
            .map(|(path, size)| (path.as_path(), *size))
    }

    /// Reads a raw entry back from the scratch directory.
    pub fn raw(&self, entry: &Path) -> PackageResult<Vec<u8>> {
        if self.closed {
            return Err(PackageError::SessionClosed);
        }
        if !self.entries.contains_key(entry) {
            return Err(PackageError::EntryNotFound(
                entry.to_string_lossy().into_owned(),
            ));
        }
        let mut file = File::open(self.scratch.join(entry))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Releases the scratch directory. The session is unusable after.
    pub fn close(mut self) -> PackageResult<()> {
        self.closed = true;
        fs::remove_dir_all(&self.scratch)?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed && self.scratch.exists() {
            if let Err(err) = fs::remove_dir_all(&self.scratch) {
                log::warn!("failed to remove scratch dir {:?}: {err}", self.scratch);
            }
        }
    }
}

/// Options to select which kind of asset is actually parsed when opening
/// an APK [session](Session).
#[derive(Debug)]
pub struct Options {
    parse_dex: bool,
    parse_manifest: bool,
    parse_resources: bool,
}

/// Default values enable dex parsing, manifest parsing and resources
/// parsing.
impl Default for Options {
    fn default() -> Self {
        Self {
            parse_dex: true,
            parse_manifest: true,
            parse_resources: true,
        }
    }
}

impl Options {
    #[must_use]
    pub const fn manifest_only() -> Self {
        Self {
            parse_dex: false,
            parse_manifest: true,
            parse_resources: false,
        }
    }

    #[must_use]
    pub const fn dont_parse_dex(self) -> Self {
        Self {
            parse_dex: false,
            ..self
        }
    }

    #[must_use]
    pub const fn dont_parse_resources(self) -> Self {
        Self {
            parse_resources: false,
            ..self
        }
    }

    pub fn open<P: AsRef<Path>>(self, path: P) -> PackageResult<Session> {
        let package_name = path
            .as_ref()
            .file_name()
            .map_or_else(|| "package".to_string(), |n| n.to_string_lossy().into_owned());

        let scratch = scratch_dir_for(&package_name);
        fs::create_dir_all(&scratch)?;
        log::debug!("extracting {package_name} to {scratch:?}");

        match self.extract(path.as_ref(), &scratch, package_name) {
            Ok(session) => Ok(session),
            Err(err) => {
                // Extraction is all-or-nothing; no half-built session
                // survives.
                let _ = fs::remove_dir_all(&scratch);
                Err(err)
            }
        }
    }

    fn extract(&self, path: &Path, scratch: &Path, name: String) -> PackageResult<Session> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(file)?;

        let mut dex_blobs: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut manifest_blob: Option<Vec<u8>> = None;
        let mut resources_blob: Option<Vec<u8>> = None;
        let mut entries = BTreeMap::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let relative = entry
                .enclosed_name()
                .map(Path::to_path_buf)
                .ok_or_else(|| PackageError::BadEntryName(entry_name.clone()))?;

            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;

            let target = scratch.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &buffer)?;
            entries.insert(relative, buffer.len());

            if self.parse_dex {
                if let Some(index) = helpers::dex_index(&entry_name) {
                    dex_blobs.push((index, buffer));
                    continue;
                }
            }
            if self.parse_manifest && helpers::is_manifest(&entry_name) {
                manifest_blob = Some(buffer);
            } else if self.parse_resources && helpers::is_resources(&entry_name) {
                resources_blob = Some(buffer);
            }
        }

        dex_blobs.sort_by_key(|(index, _)| *index);
        let dexs = dex_blobs
            .into_par_iter()
            .map(|(index, blob)| {
                log::debug!("parsing dex #{index} ({} bytes)", blob.len());
                dr_dex::parse(&blob).map_err(PackageError::from)
            })
            .collect::<PackageResult<Vec<Dex>>>()?;

        let manifest = manifest_blob
            .map(|blob| manifest::parse(&blob))
            .transpose()?;
        let resources = resources_blob
            .map(|blob| dr_resources::parse_table(&blob))
            .transpose()?;

        Ok(Session {
            name,
            scratch: scratch.to_path_buf(),
            dexs,
            manifest,
            resources,
            entries,
            closed: false,
        })
    }
}

fn scratch_dir_for(package_name: &str) -> PathBuf {
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "droidrunner-{}-{}-{}",
        std::process::id(),
        seq,
        package_name.replace(['/', '\\'], "_")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn sample_apk(path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();
        zip.start_file("res/values/strings.xml", options).unwrap();
        zip.write_all(b"placeholder").unwrap();
        zip.start_file("assets/data.bin", options).unwrap();
        zip.write_all(&[1, 2, 3]).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn session_extracts_and_releases() {
        let dir = std::env::temp_dir().join(format!("dr-package-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let apk = dir.join("sample.apk");
        sample_apk(&apk);

        let session = Session::open(&apk).unwrap();
        let scratch = session.scratch_dir().to_path_buf();
        assert!(scratch.exists());
        assert_eq!(session.iter_entries().count(), 2);
        assert_eq!(
            session.raw(Path::new("assets/data.bin")).unwrap(),
            vec![1, 2, 3]
        );
        assert!(session.manifest().is_none());
        assert!(session.resources().is_none());

        session.close().unwrap();
        assert!(!scratch.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_entry_is_reported() {
        let dir = std::env::temp_dir().join(format!("dr-package-test2-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let apk = dir.join("sample.apk");
        sample_apk(&apk);

        let session = Session::open(&apk).unwrap();
        assert!(matches!(
            session.raw(Path::new("nope")),
            Err(PackageError::EntryNotFound(_))
        ));
        session.close().unwrap();
        fs::remove_dir_all(&dir).unwrap();
    }
}
