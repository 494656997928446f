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

pub mod report {
    use std::fmt::Display;
    use std::io::Write;

    use crate::model::model::{Configuration, DatasetFile, TrialResult};
    use crate::timing::timing::FileTiming;

    /// Observer of benchmark progress. Implementations must not fail the run.
    pub trait Reporter {
        fn pass_started(&mut self, configuration: Configuration);
        fn file_started(&mut self, file: &DatasetFile);
        fn trial_finished(&mut self, trial: &TrialResult<'_>);
        fn file_finished(&mut self, timing: &FileTiming);
        fn failed(&mut self, error: &dyn Display);
        fn partial_results(&mut self, completed: &[FileTiming]);
    }

    pub struct TextReporter<W: Write> {
        out: W,
    }

    impl<W: Write> TextReporter<W> {
        pub fn new(out: W) -> TextReporter<W> {
            TextReporter { out }
        }

        #[cfg(test)]
        pub fn into_inner(self) -> W {
            self.out
        }
    }

    // Write errors are dropped on purpose, output is best effort.
    impl<W: Write> Reporter for TextReporter<W> {
        fn pass_started(&mut self, configuration: Configuration) {
            let _ = writeln!(self.out, "\n[Running CDC chunker {}]\n", configuration);
        }

        fn file_started(&mut self, file: &DatasetFile) {
            let _ = writeln!(self.out, "File: {}", file.name());
        }

        fn trial_finished(&mut self, trial: &TrialResult<'_>) {
            let _ = writeln!(self.out, "[{}] Time elapsed: {:?}", trial.file.name(), trial.elapsed);
        }

        fn file_finished(&mut self, timing: &FileTiming) {
            let _ = writeln!(
                self.out,
                "[{}] Average time elapsed: {:?} ({:.2} MiB/s)",
                timing.file.name(),
                timing.average,
                timing.throughput_mib_s()
            );
        }

        fn failed(&mut self, error: &dyn Display) {
            let _ = writeln!(self.out, "{}", error);
        }

        fn partial_results(&mut self, completed: &[FileTiming]) {
            if completed.is_empty() {
                return;
            }
            let _ = writeln!(self.out, "\n[Partial results]\n");
            for timing in completed {
                let _ = writeln!(
                    self.out,
                    "[{}] {}: average {:?} over {} runs",
                    timing.file.name(),
                    timing.configuration,
                    timing.average,
                    timing.runs
                );
            }
        }
    }
}
