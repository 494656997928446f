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

pub mod timing {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;
    use log::warn;

    use crate::model::model::{Configuration, DatasetFile, TrialResult};

    const MIB: f64 = 1024.0 * 1024.0;

    /// Average of one file's trials within one pass.
    #[derive(Debug, Clone, PartialEq)]
    pub struct FileTiming {
        pub file: DatasetFile,
        pub configuration: Configuration,
        pub runs: u32,
        pub average: Duration,
    }

    impl FileTiming {
        pub fn throughput_mib_s(&self) -> f64 {
            let secs = self.average.as_secs_f64();
            if secs == 0.0 {
                return 0.0;
            }
            self.file.byte_size as f64 / MIB / secs
        }
    }

    /// Finished averages of one pass, in the order the files ran.
    #[derive(Debug, Clone, PartialEq)]
    pub struct PassTimings {
        pub configuration: Configuration,
        pub files: Vec<FileTiming>,
    }

    /// Running totals for a single pass. A new one is built for every pass and
    /// consumed by `finish`, so nothing carries over between configurations.
    pub struct Accumulator {
        configuration: Configuration,
        totals: HashMap<PathBuf, Duration>,
        finished: Vec<FileTiming>,
    }

    impl Accumulator {
        pub fn new(configuration: Configuration) -> Accumulator {
            Accumulator { configuration, totals: HashMap::new(), finished: Vec::new() }
        }

        #[cfg(test)]
        pub fn is_empty(&self) -> bool {
            self.totals.is_empty()
        }

        #[cfg(test)]
        pub fn total(&self, path: &std::path::Path) -> Option<Duration> {
            self.totals.get(path).copied()
        }

        /// Adds a trial to its file's total. Trials from another configuration
        /// are refused.
        pub fn record(&mut self, trial: &TrialResult<'_>) -> bool {
            if trial.configuration != self.configuration {
                warn!("Refusing {} trial in {} pass for {:?}", trial.configuration, self.configuration, trial.file.path);
                return false;
            }
            *self.totals.entry(trial.file.path.clone()).or_default() += trial.elapsed;
            true
        }

        pub fn finish_file(&mut self, file: &DatasetFile, runs: u32) -> FileTiming {
            let total = self.totals.get(&file.path).copied().unwrap_or_default();
            let timing = FileTiming {
                file: file.clone(),
                configuration: self.configuration,
                runs,
                average: total.checked_div(runs).unwrap_or_default(),
            };
            self.finished.push(timing.clone());
            timing
        }

        pub fn finish(self) -> PassTimings {
            PassTimings { configuration: self.configuration, files: self.finished }
        }
    }
}
