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

pub mod engine {
    use std::{fmt, io};
    use std::fmt::Formatter;
    use std::io::{ErrorKind, Read};
    use aes::Aes128;
    use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
    use log::debug;
    use sha2::{Digest, Sha256};

    use crate::model::model::Configuration;

    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;

    pub const WINDOW_SIZE: usize = 64;
    pub const MIN_SIZE: usize = 512 * KIB;
    pub const MAX_SIZE: usize = 8 * MIB;
    const READ_BUFFER_SIZE: usize = 512 * KIB;
    // ~1 MiB average chunk
    const SPLIT_MASK: u64 = (1 << 20) - 1;
    const KEY_LABEL: &[u8] = b"cdc-bench boundary key";

    #[derive(Debug)]
    pub enum ChunkError {
        InvalidPolynomial(u64),
        Io(io::Error),
    }

    impl fmt::Display for ChunkError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                ChunkError::InvalidPolynomial(value) => write!(f, "Invalid splitting polynomial {:#x}", value),
                ChunkError::Io(e) => write!(f, "Error chunking data: {}", e),
            }
        }
    }

    impl std::error::Error for ChunkError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                ChunkError::Io(e) => Some(e),
                ChunkError::InvalidPolynomial(_) => None,
            }
        }
    }

    impl From<io::Error> for ChunkError {
        fn from(e: io::Error) -> Self {
            ChunkError::Io(e)
        }
    }

    /// Polynomial over GF(2), bit `i` being the coefficient of `x^i`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Polynomial(u64);

    fn degree_of(x: u64) -> i32 {
        63 - x.leading_zeros() as i32
    }

    impl Polynomial {
        /// The rolling digest keeps 8 bits above `degree - 8` and shifts left by
        /// a byte, so the degree must lie in 9..=56.
        pub fn new(value: u64) -> Result<Polynomial, ChunkError> {
            let degree = degree_of(value);
            if !(9..=56).contains(&degree) {
                return Err(ChunkError::InvalidPolynomial(value));
            }
            Ok(Polynomial(value))
        }

        pub fn value(&self) -> u64 {
            self.0
        }

        pub fn degree(&self) -> i32 {
            degree_of(self.0)
        }

        /// `x mod self`
        pub fn reduce(&self, mut x: u64) -> u64 {
            let degree = self.degree();
            while degree_of(x) >= degree {
                x ^= self.0 << (degree_of(x) - degree);
            }
            x
        }

        fn append_byte(&self, hash: u64, b: u8) -> u64 {
            self.reduce((hash << 8) | b as u64)
        }
    }

    struct Tables {
        out: [u64; 256],
        modulo: [u64; 256],
    }

    impl Tables {
        fn new(pol: Polynomial) -> Tables {
            let mut out = [0u64; 256];
            let mut modulo = [0u64; 256];
            let degree = pol.degree() as u32;
            for b in 0..256usize {
                // hash of b followed by WINDOW_SIZE - 1 zero bytes
                let mut hash = pol.append_byte(0, b as u8);
                for _ in 0..WINDOW_SIZE - 1 {
                    hash = pol.append_byte(hash, 0);
                }
                out[b] = hash;

                // low part reduces, high part cancels the top byte
                let shifted = (b as u64) << degree;
                modulo[b] = pol.reduce(shifted) | shifted;
            }
            Tables { out, modulo }
        }
    }

    /// Decides whether a rolling digest marks a chunk boundary.
    pub trait BoundaryTest {
        fn is_boundary(&self, digest: u64) -> bool;
    }

    pub struct PlainBoundary;

    impl BoundaryTest for PlainBoundary {
        #[inline]
        fn is_boundary(&self, digest: u64) -> bool {
            digest & SPLIT_MASK == 0
        }
    }

    /// Keyed boundary test: the digest goes through one AES-128 block
    /// encryption. The `aes` crate picks AES-NI when the CPU has it.
    pub struct AesBoundary {
        cipher: Aes128,
    }

    impl AesBoundary {
        pub fn new(pol: Polynomial) -> AesBoundary {
            let key = Sha256::new()
                .chain_update(KEY_LABEL)
                .chain_update(pol.value().to_be_bytes())
                .finalize();
            let cipher = Aes128::new(GenericArray::from_slice(&key[..16]));
            AesBoundary { cipher }
        }
    }

    impl BoundaryTest for AesBoundary {
        #[inline]
        fn is_boundary(&self, digest: u64) -> bool {
            let mut block = GenericArray::from([0u8; 16]);
            block[..8].copy_from_slice(&digest.to_be_bytes());
            self.cipher.encrypt_block(&mut block);
            let mut low = [0u8; 8];
            low.copy_from_slice(&block[8..]);
            u64::from_be_bytes(low) & SPLIT_MASK == 0
        }
    }

    /// Position of one chunk in the stream. The bytes land in the caller's buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Chunk {
        pub start: usize,
        pub length: usize,
        pub cut: u64,
    }

    /// Pull side of a chunker. `Ok(None)` is end of stream and is returned
    /// again on every later call.
    pub trait ChunkSource {
        fn next_chunk(&mut self, buf: &mut Vec<u8>) -> Result<Option<Chunk>, ChunkError>;
    }

    pub trait Engine {
        fn construct<'a, R: Read + 'a>(&self, reader: R, polynomial: u64, configuration: Configuration) -> Result<Box<dyn ChunkSource + 'a>, ChunkError>;
    }

    /// Rabin fingerprint chunker over a 64 byte window.
    pub struct RabinEngine;

    impl Engine for RabinEngine {
        fn construct<'a, R: Read + 'a>(&self, reader: R, polynomial: u64, configuration: Configuration) -> Result<Box<dyn ChunkSource + 'a>, ChunkError> {
            let pol = Polynomial::new(polynomial)?;
            debug!("Constructing chunker {} for polynomial {:#x}", configuration, polynomial);
            let source: Box<dyn ChunkSource + 'a> = match configuration {
                Configuration::Accelerated => Box::new(Chunker::new(reader, pol, AesBoundary::new(pol))),
                Configuration::Plain => Box::new(Chunker::new(reader, pol, PlainBoundary)),
            };
            Ok(source)
        }
    }

    pub struct Chunker<R: Read, B: BoundaryTest> {
        reader: R,
        boundary: B,
        tables: Box<Tables>,
        pol_shift: u32,

        buf: Vec<u8>,
        bpos: usize,
        bmax: usize,

        start: usize,
        count: usize,
        pos: usize,
        // bytes to copy before hashing starts again
        pre: usize,

        window: [u8; WINDOW_SIZE],
        wpos: usize,
        digest: u64,
        closed: bool,
    }

    impl<R: Read, B: BoundaryTest> Chunker<R, B> {
        pub fn new(reader: R, pol: Polynomial, boundary: B) -> Chunker<R, B> {
            let mut chunker = Chunker {
                reader,
                boundary,
                tables: Box::new(Tables::new(pol)),
                pol_shift: pol.degree() as u32 - 8,
                buf: vec![0u8; READ_BUFFER_SIZE],
                bpos: 0,
                bmax: 0,
                start: 0,
                count: 0,
                pos: 0,
                pre: 0,
                window: [0u8; WINDOW_SIZE],
                wpos: 0,
                digest: 0,
                closed: false,
            };
            chunker.reset();
            chunker
        }

        fn reset(&mut self) {
            self.window = [0u8; WINDOW_SIZE];
            self.wpos = 0;
            self.count = 0;
            self.digest = 0;
            let (digest, wpos) = roll(&self.tables, self.pol_shift, &mut self.window, self.wpos, self.digest, 1);
            self.digest = digest;
            self.wpos = wpos;
            self.start = self.pos;
            self.pre = MIN_SIZE - WINDOW_SIZE;
        }

        fn fill(&mut self) -> io::Result<usize> {
            let mut filled = 0;
            while filled < self.buf.len() {
                match self.reader.read(&mut self.buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(filled)
        }
    }

    #[inline(always)]
    fn roll(tables: &Tables, pol_shift: u32, window: &mut [u8; WINDOW_SIZE], wpos: usize, digest: u64, b: u8) -> (u64, usize) {
        let out = window[wpos];
        window[wpos] = b;
        let mut digest = digest ^ tables.out[out as usize];
        let index = (digest >> pol_shift) as usize;
        digest = (digest << 8) | b as u64;
        digest ^= tables.modulo[index];
        (digest, (wpos + 1) % WINDOW_SIZE)
    }

    impl<R: Read, B: BoundaryTest> ChunkSource for Chunker<R, B> {
        fn next_chunk(&mut self, data: &mut Vec<u8>) -> Result<Option<Chunk>, ChunkError> {
            data.clear();
            loop {
                if self.bpos >= self.bmax {
                    let n = self.fill()?;
                    if n == 0 {
                        if !self.closed {
                            self.closed = true;
                            if self.count > 0 {
                                return Ok(Some(Chunk { start: self.start, length: self.count, cut: self.digest }));
                            }
                        }
                        return Ok(None);
                    }
                    self.bpos = 0;
                    self.bmax = n;
                }

                if self.pre > 0 {
                    let n = self.bmax - self.bpos;
                    let take = n.min(self.pre);
                    data.extend_from_slice(&self.buf[self.bpos..self.bpos + take]);
                    self.bpos += take;
                    self.count += take;
                    self.pos += take;
                    self.pre -= take;
                    if self.pre > 0 {
                        continue;
                    }
                }

                let mut add = self.count;
                let mut digest = self.digest;
                let mut wpos = self.wpos;
                for i in self.bpos..self.bmax {
                    let b = self.buf[i];
                    (digest, wpos) = roll(&self.tables, self.pol_shift, &mut self.window, wpos, digest, b);
                    add += 1;
                    if add < MIN_SIZE {
                        continue;
                    }
                    if add >= MAX_SIZE || self.boundary.is_boundary(digest) {
                        let end = i + 1;
                        data.extend_from_slice(&self.buf[self.bpos..end]);
                        self.pos += end - self.bpos;
                        self.bpos = end;
                        self.count = add;
                        let chunk = Chunk { start: self.start, length: self.count, cut: digest };
                        self.reset();
                        return Ok(Some(chunk));
                    }
                }
                self.digest = digest;
                self.wpos = wpos;

                let steps = self.bmax - self.bpos;
                data.extend_from_slice(&self.buf[self.bpos..self.bmax]);
                self.count += steps;
                self.pos += steps;
                self.bpos = self.bmax;
            }
        }
    }
}

#[cfg(test)]
mod engine_tests {
    use std::io::Cursor;
    use crate::engine::engine::{ChunkError, ChunkSource, Engine, Polynomial, RabinEngine, MAX_SIZE, MIN_SIZE};
    use crate::model::model::{Configuration, DEFAULT_POLYNOMIAL};

    fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
        let mut state = seed | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    fn drain(data: &[u8], configuration: Configuration) -> Vec<Vec<u8>> {
        let mut chunker = RabinEngine.construct(Cursor::new(data), DEFAULT_POLYNOMIAL, configuration).unwrap();
        let mut buf = Vec::with_capacity(MAX_SIZE);
        let mut chunks = Vec::new();
        let mut offset = 0;
        while let Some(chunk) = chunker.next_chunk(&mut buf).unwrap() {
            assert_eq!(chunk.start, offset);
            assert_eq!(chunk.length, buf.len());
            offset += chunk.length;
            chunks.push(buf.clone());
        }
        assert!(chunker.next_chunk(&mut buf).unwrap().is_none());
        chunks
    }

    #[test]
    fn polynomial_degree_bounds() {
        let pol = Polynomial::new(DEFAULT_POLYNOMIAL).unwrap();
        assert_eq!(pol.degree(), 53);
        assert!(matches!(Polynomial::new(0), Err(ChunkError::InvalidPolynomial(0))));
        assert!(Polynomial::new(0xff).is_err());
        assert!(Polynomial::new(1 << 60).is_err());
    }

    #[test]
    fn polynomial_reduce() {
        let pol = Polynomial::new(DEFAULT_POLYNOMIAL).unwrap();
        assert_eq!(pol.reduce(DEFAULT_POLYNOMIAL), 0);
        assert_eq!(pol.reduce(0x1234), 0x1234);
        assert!(pol.reduce(u64::MAX) < (1 << 53));
    }

    #[test]
    fn invalid_polynomial_is_rejected_at_construction() {
        let result = RabinEngine.construct(Cursor::new(vec![0u8; 16]), 0x3, Configuration::Plain);
        assert!(matches!(result, Err(ChunkError::InvalidPolynomial(0x3))));
    }

    #[test]
    fn empty_stream_ends_immediately() {
        for configuration in Configuration::ALL {
            assert!(drain(&[], configuration).is_empty());
        }
    }

    #[test]
    fn short_stream_is_one_chunk() {
        let data = pseudo_random(1024, 3);
        for configuration in Configuration::ALL {
            let chunks = drain(&data, configuration);
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0], data);
        }
    }

    #[test]
    fn chunks_cover_the_stream_within_limits() {
        let data = pseudo_random(6 * 1024 * 1024 + 123, 42);
        for configuration in Configuration::ALL {
            let chunks = drain(&data, configuration);
            assert_eq!(chunks.concat(), data);
            let (last, rest) = chunks.split_last().unwrap();
            for chunk in rest {
                assert!(chunk.len() >= MIN_SIZE && chunk.len() <= MAX_SIZE, "{}", chunk.len());
            }
            assert!(last.len() <= MAX_SIZE);
        }
    }

    #[test]
    fn uniform_input_is_cut_at_max_size_at_the_latest() {
        let data = vec![0u8; 2 * MAX_SIZE + 5];
        for configuration in Configuration::ALL {
            let chunks = drain(&data, configuration);
            assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), data.len());
            assert!(chunks.len() >= 3);
            assert!(chunks.iter().all(|c| c.len() <= MAX_SIZE));
        }
    }

    #[test]
    fn deterministic_per_backend() {
        let data = pseudo_random(3 * 1024 * 1024, 9);
        for configuration in Configuration::ALL {
            assert_eq!(drain(&data, configuration), drain(&data, configuration));
        }
    }
}
