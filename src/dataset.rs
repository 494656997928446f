// Copyright (c) 2022-2025 Chris Kroells
// 
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// 
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
// 
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

pub mod dataset {
    use std::{fmt, fs, io};
    use std::fmt::Formatter;
    use std::path::{Path, PathBuf};
    use log::{debug, error, info, warn};

    use crate::model::model::{osstr_to_string, DatasetFile, SAMPLE_SUFFIX};

    #[derive(Debug)]
    pub enum DatasetError {
        ReadDir(io::Error, PathBuf),
        NoValidFiles(PathBuf),
        SizeProbe(io::Error, PathBuf),
    }

    impl fmt::Display for DatasetError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                DatasetError::ReadDir(e, dir) => write!(f, "Error reading dataset folder {:?}: {}", dir, e),
                DatasetError::NoValidFiles(dir) => write!(f, "No valid files found in the dataset folder {:?}.", dir),
                DatasetError::SizeProbe(e, path) => write!(f, "Could not read the size of {:?}: {}", path, e),
            }
        }
    }

    impl std::error::Error for DatasetError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                DatasetError::ReadDir(e, _) | DatasetError::SizeProbe(e, _) => Some(e),
                DatasetError::NoValidFiles(_) => None,
            }
        }
    }

    fn is_sample(path: &Path) -> bool {
        match path.file_name() {
            Some(name) => osstr_to_string(name).ends_with(SAMPLE_SUFFIX),
            None => false,
        }
    }

    /// Lists the sample files directly inside `dir`, smallest first.
    ///
    /// Sizes are probed once here. A file whose size cannot be read fails the
    /// whole discovery rather than being ordered arbitrarily, and files of equal
    /// size are ordered by name so the order is total.
    pub fn discover(dir: &Path) -> Result<Vec<DatasetFile>, DatasetError> {
        let entries = match fs::read_dir(dir) {
            Ok(any) => any,
            Err(err) => {
                error!("Error while attempting to read entries in {:?}! -> {}", dir, err);
                return Err(DatasetError::ReadDir(err, dir.to_path_buf()));
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry in {:?} -> {}", dir, err);
                    continue;
                }
            };
            let path = entry.path();
            if !is_sample(&path) {
                debug!("Skipping {:?}", path);
                continue;
            }
            // follows symlinks, so a dangling link named *.bin fails here
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    error!("Could not probe size of {:?} -> {}", path, err);
                    return Err(DatasetError::SizeProbe(err, path));
                }
            };
            if !metadata.is_file() {
                debug!("Skipping {:?}", path);
                continue;
            }
            files.push(DatasetFile::new(path, metadata.len()));
        }

        if files.is_empty() {
            error!("No valid files found in {:?}", dir);
            return Err(DatasetError::NoValidFiles(dir.to_path_buf()));
        }

        files.sort_by(|a, b| a.byte_size.cmp(&b.byte_size).then_with(|| a.path.cmp(&b.path)));
        info!("Discovered {} sample files in {:?}", files.len(), dir);
        Ok(files)
    }
}

#[cfg(test)]
mod dataset_tests {
    use std::fs;
    use tempfile::TempDir;
    use crate::dataset::dataset::{discover, DatasetError};

    fn write_file(dir: &TempDir, name: &str, size: usize) {
        fs::write(dir.path().join(name), vec![7u8; size]).unwrap();
    }

    #[test]
    fn sorted_by_ascending_size() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "large.bin", 4096);
        write_file(&dir, "small.bin", 16);
        write_file(&dir, "medium.bin", 1024);
        write_file(&dir, "tiny.bin", 0);

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 4);
        for pair in files.windows(2) {
            assert!(pair[0].byte_size <= pair[1].byte_size);
        }
        let names: Vec<String> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["tiny.bin", "small.bin", "medium.bin", "large.bin"]);
    }

    #[test]
    fn equal_sizes_ordered_by_name() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "c.bin", 100);
        write_file(&dir, "a.bin", 100);
        write_file(&dir, "b.bin", 100);

        let names: Vec<String> = discover(dir.path()).unwrap().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);
    }

    #[test]
    fn skips_other_extensions_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "sample.bin", 10);
        write_file(&dir, "notes.txt", 10);
        write_file(&dir, "sample.bin.bak", 10);
        fs::create_dir(dir.path().join("nested.bin")).unwrap();
        fs::write(dir.path().join("nested.bin").join("inner.bin"), b"x").unwrap();

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "sample.bin");
        assert_eq!(files[0].byte_size, 10);
    }

    #[test]
    fn no_valid_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "readme.md", 10);
        match discover(dir.path()) {
            Err(DatasetError::NoValidFiles(path)) => assert_eq!(path, dir.path()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn dangling_sample_link_fails_size_probe() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.bin", 10);
        let link = dir.path().join("gone.bin");
        std::os::unix::fs::symlink(dir.path().join("missing-target"), &link).unwrap();
        match discover(dir.path()) {
            Err(DatasetError::SizeProbe(_, path)) => assert_eq!(path, link),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(matches!(discover(&missing), Err(DatasetError::ReadDir(_, _))));
    }
}
