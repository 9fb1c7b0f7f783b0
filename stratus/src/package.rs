// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The artifact packager turns a code location into a deployable archive.
//!
//! Pre-built `.zip`/`.jar`/`.war` artifacts pass through untouched; anything
//! else is treated as a source directory and zipped into the package cache.

use crate::config::STRATUS_PACKAGE_CACHE_DIR;
use crate::error::{Result, StratusError};
use bytes::Bytes;
use log::info;
use std::fs;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

const ARCHIVE_SUFFIXES: [&str; 3] = [".zip", ".jar", ".war"];

/// Resolves a code location into the archive bytes uploaded to the compute
/// service.
pub trait Packager: Send + Sync {
    /// Returns the archive for `code_uri`, packaging it first when it is not
    /// an archive already.
    fn resolve(&self, code_uri: &str, function_name: &str) -> Result<Bytes>;
}

/// The default packager, writing generated archives into a cache directory.
pub struct ZipPackager {
    cache_dir: PathBuf,
}

impl ZipPackager {
    /// Creates a packager dropping archives under `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }
}

impl Default for ZipPackager {
    fn default() -> Self {
        Self::new(PathBuf::from(STRATUS_PACKAGE_CACHE_DIR.as_str()))
    }
}

impl Packager for ZipPackager {
    fn resolve(&self, code_uri: &str, function_name: &str) -> Result<Bytes> {
        if is_prebuilt_archive(code_uri) {
            return Ok(Bytes::from(fs::read(code_uri)?));
        }

        info!("Start compressing code.");
        let archive = self.cache_dir.join(format!("{}.zip", function_name));
        let count = zip_directory(Path::new(code_uri), &archive)?;
        if count == 0 {
            return Err(StratusError::Internal("Zip file error".to_string()));
        }
        info!("Successfully compressed code ({} files).", count);

        Ok(Bytes::from(fs::read(&archive)?))
    }
}

fn is_prebuilt_archive(code_uri: &str) -> bool {
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| code_uri.ends_with(suffix))
}

/// Zips `source` recursively into `archive` and returns the number of
/// packaged files.
fn zip_directory(source: &Path, archive: &Path) -> Result<usize> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(archive)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut count = 0;
    add_directory(&mut writer, source, Path::new(""), options, &mut count)?;
    writer.finish()?;
    Ok(count)
}

fn add_directory<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    directory: &Path,
    prefix: &Path,
    options: FileOptions,
    count: &mut usize,
) -> Result<()> {
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        if path.is_dir() {
            writer.add_directory(name.to_string_lossy(), options)?;
            add_directory(writer, &path, &name, options, count)?;
        } else {
            writer.start_file(name.to_string_lossy(), options)?;
            let mut file = fs::File::open(&path)?;
            io::copy(&mut file, writer)?;
            *count += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_a_source_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("lib"))?;
        fs::write(source.join("index.js"), "exports.handler = () => {};")?;
        fs::write(source.join("lib/util.js"), "module.exports = {};")?;

        let packager = ZipPackager::new(dir.path().join("cache"));
        let bytes = packager.resolve(source.to_str().unwrap(), "hello")?;
        assert!(!bytes.is_empty());
        // Zip local file headers start with PK\x03\x04.
        assert_eq!(&bytes[..2], b"PK");
        Ok(())
    }

    #[test]
    fn empty_directory_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("empty");
        fs::create_dir_all(&source)?;

        let packager = ZipPackager::new(dir.path().join("cache"));
        let result = packager.resolve(source.to_str().unwrap(), "hello");
        assert!(matches!(result, Err(StratusError::Internal(_))));
        Ok(())
    }

    #[test]
    fn prebuilt_archives_pass_through() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("prebuilt.zip");
        fs::write(&archive, b"PK\x03\x04fake")?;

        let packager = ZipPackager::new(dir.path().join("cache"));
        let bytes = packager.resolve(archive.to_str().unwrap(), "hello")?;
        assert_eq!(Bytes::from_static(b"PK\x03\x04fake"), bytes);
        Ok(())
    }
}
