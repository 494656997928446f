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

pub mod benchmark {
    use std::{fmt, io};
    use std::fmt::Formatter;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use log::{debug, error, info};

    use crate::dataset::dataset::{discover, DatasetError};
    use crate::engine::engine::{ChunkError, Engine, Polynomial, MAX_SIZE};
    use crate::model::model::{BenchSettings, Configuration, DatasetFile, TrialResult};
    use crate::report::report::Reporter;
    use crate::timing::timing::{Accumulator, FileTiming, PassTimings};

    #[derive(Debug)]
    pub enum TrialError {
        Open(io::Error, PathBuf),
        Chunk(ChunkError, PathBuf),
    }

    impl fmt::Display for TrialError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                TrialError::Open(e, path) => write!(f, "Error opening file {:?}: {}", path, e),
                TrialError::Chunk(e, path) => write!(f, "Error chunking data in {:?}: {}", path, e),
            }
        }
    }

    impl std::error::Error for TrialError {}

    #[derive(Debug)]
    pub enum BenchError {
        Config(DatasetError),
        Polynomial(ChunkError),
        /// The pull buffer cannot hold a maximum-size chunk.
        BufferTooSmall(usize),
        /// `completed` holds every file average finished before the failure.
        Runtime { error: TrialError, completed: Vec<FileTiming> },
    }

    impl BenchError {
        pub fn exit_code(&self) -> u8 {
            match self {
                BenchError::Config(_) | BenchError::Polynomial(_) | BenchError::BufferTooSmall(_) => 2,
                BenchError::Runtime { .. } => 1,
            }
        }
    }

    impl fmt::Display for BenchError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                BenchError::Config(e) => write!(f, "{}", e),
                BenchError::Polynomial(e) => write!(f, "{}", e),
                BenchError::BufferTooSmall(size) => write!(f, "Buffer size {} is smaller than the largest chunk ({} bytes)", size, MAX_SIZE),
                BenchError::Runtime { error, .. } => write!(f, "{}", error),
            }
        }
    }

    impl std::error::Error for BenchError {}

    pub struct PassFailure {
        pub error: TrialError,
        pub completed: Vec<FileTiming>,
    }

    /// Drains `file` once through a fresh chunker. The clock covers opening the
    /// file and the whole drain. The file is closed on every return path.
    pub fn run_trial<E: Engine>(engine: &E, file: &DatasetFile, configuration: Configuration, settings: &BenchSettings) -> Result<Duration, TrialError> {
        let mut buf = Vec::with_capacity(settings.buffer_size);

        let start = Instant::now();
        let fd = File::open(&file.path).map_err(|e| TrialError::Open(e, file.path.clone()))?;
        let reader = BufReader::new(fd);
        let mut chunker = engine
            .construct(reader, settings.polynomial, configuration)
            .map_err(|e| TrialError::Chunk(e, file.path.clone()))?;

        let mut chunks = 0usize;
        loop {
            match chunker.next_chunk(&mut buf) {
                Ok(Some(_)) => chunks += 1,
                Ok(None) => break,
                Err(e) => return Err(TrialError::Chunk(e, file.path.clone())),
            }
        }
        let elapsed = start.elapsed();
        debug!("{} {}: {} chunks in {:?}", file.name(), configuration, chunks, elapsed);
        Ok(elapsed)
    }

    /// One sweep of every file under `configuration`. Returns that pass's
    /// averages; on failure, the averages finished so far come back with the
    /// error.
    pub fn run_pass<E: Engine, R: Reporter>(
        engine: &E,
        files: &[DatasetFile],
        configuration: Configuration,
        settings: &BenchSettings,
        reporter: &mut R,
    ) -> Result<PassTimings, PassFailure> {
        reporter.pass_started(configuration);
        info!("Starting pass {} over {} files", configuration, files.len());

        let mut accumulator = Accumulator::new(configuration);
        for file in files {
            reporter.file_started(file);

            for _ in 0..settings.warmup {
                if let Err(error) = run_trial(engine, file, configuration, settings) {
                    error!("Warm-up failed: {}", error);
                    return Err(PassFailure { error, completed: accumulator.finish().files });
                }
            }

            for _ in 0..settings.runs {
                let elapsed = match run_trial(engine, file, configuration, settings) {
                    Ok(elapsed) => elapsed,
                    Err(error) => {
                        error!("Trial failed: {}", error);
                        return Err(PassFailure { error, completed: accumulator.finish().files });
                    }
                };
                let trial = TrialResult { file, configuration, elapsed };
                accumulator.record(&trial);
                reporter.trial_finished(&trial);
            }

            let timing = accumulator.finish_file(file, settings.runs);
            info!("{} {}: average {:?}", file.name(), configuration, timing.average);
            reporter.file_finished(&timing);
        }
        Ok(accumulator.finish())
    }

    /// Both passes over the same ordered file list, accelerated first.
    pub fn run_passes<E: Engine, R: Reporter>(
        engine: &E,
        files: &[DatasetFile],
        settings: &BenchSettings,
        reporter: &mut R,
    ) -> Result<Vec<PassTimings>, BenchError> {
        let mut passes: Vec<PassTimings> = Vec::with_capacity(Configuration::ALL.len());
        for configuration in Configuration::ALL {
            match run_pass(engine, files, configuration, settings, reporter) {
                Ok(pass) => passes.push(pass),
                Err(failure) => {
                    let mut completed: Vec<FileTiming> = passes.into_iter().flat_map(|pass| pass.files).collect();
                    completed.extend(failure.completed);
                    return Err(BenchError::Runtime { error: failure.error, completed });
                }
            }
        }
        Ok(passes)
    }

    pub fn run<E: Engine, R: Reporter>(engine: &E, settings: &BenchSettings, reporter: &mut R) -> Result<Vec<PassTimings>, BenchError> {
        if let Err(e) = Polynomial::new(settings.polynomial) {
            error!("{}", e);
            return Err(BenchError::Polynomial(e));
        }
        if settings.buffer_size < MAX_SIZE {
            error!("Buffer size {} is below the maximum chunk size {}", settings.buffer_size, MAX_SIZE);
            return Err(BenchError::BufferTooSmall(settings.buffer_size));
        }
        let files = discover(&settings.dataset).map_err(BenchError::Config)?;
        run_passes(engine, &files, settings, reporter)
    }
}
