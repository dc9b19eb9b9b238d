use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use super::CompressedArrayError;

/// The sample values of a compressed array.
///
/// Samples are held in memory or read on demand from a file of native-endian `f64` values.
/// A file handle is opened on first read and held until [`Samples::close`].
#[derive(Debug, Clone)]
pub struct Samples {
    storage: SampleStorage,
    len: usize,
    missing_value: Option<f64>,
}

#[derive(Debug, Clone)]
enum SampleStorage {
    Memory(Arc<Vec<f64>>),
    File(Arc<SampleFile>),
}

#[derive(Debug)]
struct SampleFile {
    path: PathBuf,
    handle: Mutex<Option<File>>,
}

const SAMPLE_SIZE: usize = core::mem::size_of::<f64>();

impl Samples {
    /// Create in-memory samples.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            len: values.len(),
            storage: SampleStorage::Memory(Arc::new(values)),
            missing_value: None,
        }
    }

    /// Create samples backed by the file at `path`.
    ///
    /// # Errors
    /// Returns [`CompressedArrayError::Io`] if the file metadata cannot be read, or [`CompressedArrayError::InvalidDescription`] if its size is not a multiple of the sample size.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, CompressedArrayError> {
        let path = path.into();
        let size = usize::try_from(std::fs::metadata(&path)?.len())
            .map_err(|_| CompressedArrayError::InvalidDescription("file too large".to_string()))?;
        if size % SAMPLE_SIZE != 0 {
            return Err(CompressedArrayError::InvalidDescription(format!(
                "file {} of {size} bytes does not hold whole samples",
                path.display()
            )));
        }
        Ok(Self {
            storage: SampleStorage::File(Arc::new(SampleFile {
                path,
                handle: Mutex::new(None),
            })),
            len: size / SAMPLE_SIZE,
            missing_value: None,
        })
    }

    /// Treat samples equal to `missing_value` as missing.
    #[must_use]
    pub fn with_missing_value(mut self, missing_value: Option<f64>) -> Self {
        self.missing_value = missing_value;
        self
    }

    /// The number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing file, if any.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        match &self.storage {
            SampleStorage::Memory(_) => None,
            SampleStorage::File(file) => Some(&file.path),
        }
    }

    /// Returns true if a file handle is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match &self.storage {
            SampleStorage::Memory(_) => false,
            SampleStorage::File(file) => file.handle.lock().is_some(),
        }
    }

    /// Close the file handle, if open.
    pub fn close(&self) {
        if let SampleStorage::File(file) = &self.storage {
            if file.handle.lock().take().is_some() {
                tracing::debug!(path = %file.path.display(), "closed sample file");
            }
        }
    }

    /// Read every sample into memory.
    ///
    /// # Errors
    /// Returns [`CompressedArrayError::Io`] if the file cannot be read.
    pub fn to_memory(&self) -> Result<Self, CompressedArrayError> {
        match &self.storage {
            SampleStorage::Memory(_) => Ok(self.clone()),
            SampleStorage::File(_) => Ok(Self::new(self.read(0..self.len)?)
                .with_missing_value(self.missing_value)),
        }
    }

    /// Read the samples in `range`.
    ///
    /// # Errors
    /// Returns an error if `range` is out of bounds or the file cannot be read.
    pub fn read(&self, range: std::ops::Range<usize>) -> Result<Vec<f64>, CompressedArrayError> {
        if range.end > self.len || range.start > range.end {
            return Err(CompressedArrayError::InvalidDescription(format!(
                "sample range {range:?} is out of bounds for {} samples",
                self.len
            )));
        }
        match &self.storage {
            SampleStorage::Memory(values) => Ok(values[range].to_vec()),
            SampleStorage::File(file) => {
                let mut guard = file.handle.lock();
                let handle = match guard.take() {
                    Some(handle) => handle,
                    None => {
                        tracing::debug!(path = %file.path.display(), "opened sample file");
                        File::open(&file.path)?
                    }
                };
                let handle = guard.insert(handle);
                handle.seek(SeekFrom::Start((range.start * SAMPLE_SIZE) as u64))?;
                let mut bytes = vec![0u8; range.len() * SAMPLE_SIZE];
                handle.read_exact(&mut bytes)?;
                Ok(bytemuck::pod_collect_to_vec::<u8, f64>(&bytes))
            }
        }
    }

    /// Read the samples at `positions`, with [`None`] positions and missing values masked.
    ///
    /// Returns the values and the mask.
    ///
    /// # Errors
    /// Returns an error if a position is out of bounds or the file cannot be read.
    pub fn gather(
        &self,
        positions: &[Option<usize>],
    ) -> Result<(Vec<f64>, Vec<bool>), CompressedArrayError> {
        let Some((lo, hi)) = positions.iter().flatten().fold(None, |acc, &p| match acc {
            Some((lo, hi)) => Some((usize::min(lo, p), usize::max(hi, p + 1))),
            None => Some((p, p + 1)),
        }) else {
            return Ok((vec![0.0; positions.len()], vec![true; positions.len()]));
        };
        let values = self.read(lo..hi)?;
        Ok(positions
            .iter()
            .map(|position| match position {
                Some(p) => {
                    let value = values[p - lo];
                    (value, self.missing_value == Some(value))
                }
                None => (0.0, true),
            })
            .unzip())
    }
}
