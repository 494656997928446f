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

pub mod model {
    use std::ffi::OsStr;
    use std::fmt;
    use std::fmt::Formatter;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Splitting polynomial shared by both configurations.
    pub const DEFAULT_POLYNOMIAL: u64 = 0x3DA3358B4DC173;
    pub const DEFAULT_RUNS: u32 = 10;
    pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;
    pub const SAMPLE_SUFFIX: &str = ".bin";

    /// A sample file picked up from the dataset directory. The size is probed
    /// once at discovery and never refreshed.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DatasetFile {
        pub path: PathBuf,
        pub byte_size: u64,
    }

    impl DatasetFile {
        pub fn new(path: PathBuf, byte_size: u64) -> DatasetFile {
            DatasetFile { path, byte_size }
        }

        pub fn name(&self) -> String {
            match self.path.file_name() {
                Some(name) => osstr_to_string(name),
                None => path_to_string(&self.path),
            }
        }
    }

    /// Hash backend a pass runs with. Passes always run in `ALL` order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Configuration {
        Accelerated,
        Plain,
    }

    impl Configuration {
        pub const ALL: [Configuration; 2] = [Configuration::Accelerated, Configuration::Plain];
    }

    impl fmt::Display for Configuration {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                Configuration::Accelerated => write!(f, "with acceleration"),
                Configuration::Plain => write!(f, "without acceleration"),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrialResult<'a> {
        pub file: &'a DatasetFile,
        pub configuration: Configuration,
        pub elapsed: Duration,
    }

    #[derive(Debug, Clone)]
    pub struct BenchSettings {
        pub dataset: PathBuf,
        pub runs: u32,
        pub warmup: u32,
        pub buffer_size: usize,
        pub polynomial: u64,
    }

    impl BenchSettings {
        #[cfg(test)]
        pub fn new(dataset: &Path) -> BenchSettings {
            BenchSettings {
                dataset: dataset.to_path_buf(),
                runs: DEFAULT_RUNS,
                warmup: 0,
                buffer_size: DEFAULT_BUFFER_SIZE,
                polynomial: DEFAULT_POLYNOMIAL,
            }
        }
    }

    pub fn path_to_string(path: &Path) -> String {
        osstr_to_string(path.as_os_str())
    }

    pub fn osstr_to_string(osstr: &OsStr) -> String {
        match osstr.to_str() {
            Some(any) => any.to_string(),
            None => {
                let lossy_path = osstr.to_string_lossy().to_string();
                log::warn!("found path with non-UTF8 characters -> {}", lossy_path);
                lossy_path
            }
        }
    }
}

#[cfg(test)]
mod model_tests {
    use std::path::{Path, PathBuf};
    use crate::model::model::{BenchSettings, Configuration, DatasetFile, DEFAULT_BUFFER_SIZE};

    #[test]
    fn name_is_the_basename() {
        let file = DatasetFile::new(PathBuf::from("dataset/a.bin"), 1024);
        assert_eq!(file.name(), "a.bin");
    }

    #[test]
    fn accelerated_runs_first() {
        assert_eq!(Configuration::ALL, [Configuration::Accelerated, Configuration::Plain]);
        assert_eq!(Configuration::Accelerated.to_string(), "with acceleration");
        assert_eq!(Configuration::Plain.to_string(), "without acceleration");
    }

    #[test]
    fn default_settings() {
        let settings = BenchSettings::new(Path::new("dataset"));
        assert_eq!(settings.runs, 10);
        assert_eq!(settings.warmup, 0);
        assert_eq!(settings.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(settings.buffer_size, 8388608);
    }
}
