use std::sync::Arc;

use crate::{
    chunked::{ChunkGrid, ChunkedArray, ChunkedArrayError},
    compressed::CompressedArrayTraits,
    config::{global_config, Config},
    fill_value::FillValue,
    masked_array::MaskedArray,
    units::{Calendar, Units},
};

use super::{Data, DataError};

#[derive(Debug, Clone)]
enum DataSource {
    MaskedArray(MaskedArray),
    ChunkedArray(ChunkedArray),
    Compressed(Arc<dyn CompressedArrayTraits>),
}

/// A [`Data`] builder.
///
/// The builder is initialised from the elements of the array: an in-memory [`MaskedArray`], an existing [`ChunkedArray`], or a compressed source.
///  - The units are undefined.
///  - The chunks are regular with a size of at most the [chunk size](crate::config::Config#chunk-size) of the configuration.
///  - The mask hardness is the [hardmask](crate::config::Config#hardmask) of the configuration.
///  - No axis is cyclic, and the fill value is the default of the [fill policy](crate::config::Config#fill-policy).
///  - The configuration is a snapshot of the [global configuration](crate::config::global_config) taken by [`build`](DataBuilder::build).
///
/// For example:
///
/// ```rust
/// # use cfdata::data::DataBuilder;
/// # use cfdata::masked_array::MaskedArray;
/// # use cfdata::data_type::DataType;
/// # use cfdata::units::{Calendar, Units};
/// let data = DataBuilder::new(MaskedArray::full(&[365, 4], 0.0, DataType::Float32))
///     .units(Units::new("days since 2000-01-01")?)
///     .calendar(Calendar::NoLeap)
///     .chunks(vec![vec![100, 100, 100, 65], vec![4]])
///     .cyclic(vec![1])
///     .hardmask(false)
///     .build()?;
/// assert_eq!(data.numblocks(), vec![4, 1]);
/// assert_eq!(data.cyclic(), vec![1]);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct DataBuilder {
    source: DataSource,
    units: Units,
    calendar: Option<Calendar>,
    hardmask: Option<bool>,
    chunks: Option<Vec<Vec<usize>>>,
    cyclic: Vec<usize>,
    fill_value: Option<FillValue>,
    keepdims_indexing: bool,
    orthogonal_indexing: bool,
    config: Option<Config>,
}

impl DataBuilder {
    fn with_source(source: DataSource) -> Self {
        Self {
            source,
            units: Units::undefined(),
            calendar: None,
            hardmask: None,
            chunks: None,
            cyclic: Vec::new(),
            fill_value: None,
            keepdims_indexing: true,
            orthogonal_indexing: true,
            config: None,
        }
    }

    /// Create a builder for an array with the elements of an in-memory masked array.
    #[must_use]
    pub fn new(array: impl Into<MaskedArray>) -> Self {
        Self::with_source(DataSource::MaskedArray(array.into()))
    }

    /// Create a builder for an array with the elements of a chunked array.
    #[must_use]
    pub fn from_chunked_array(array: ChunkedArray) -> Self {
        Self::with_source(DataSource::ChunkedArray(array))
    }

    /// Create a builder for an array decompressed from a compressed source.
    ///
    /// The source is retained by the array.
    #[must_use]
    pub fn from_compressed(source: Arc<dyn CompressedArrayTraits>) -> Self {
        Self::with_source(DataSource::Compressed(source))
    }

    /// Set the units.
    pub fn units(&mut self, units: Units) -> &mut Self {
        self.units = units;
        self
    }

    /// Set the calendar of reference time units.
    ///
    /// The calendar is canonical, in that it was explicitly requested.
    pub fn calendar(&mut self, calendar: Calendar) -> &mut Self {
        self.calendar = Some(calendar);
        self
    }

    /// Set the mask hardness.
    pub fn hardmask(&mut self, hardmask: bool) -> &mut Self {
        self.hardmask = Some(hardmask);
        self
    }

    /// Set the chunk lengths of each axis.
    pub fn chunks(&mut self, chunks: Vec<Vec<usize>>) -> &mut Self {
        self.chunks = Some(chunks);
        self
    }

    /// Set the positions of the cyclic axes.
    pub fn cyclic(&mut self, cyclic: Vec<usize>) -> &mut Self {
        self.cyclic = cyclic;
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: FillValue) -> &mut Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Set whether an integer index keeps its axis (default true).
    pub fn keepdims_indexing(&mut self, keepdims_indexing: bool) -> &mut Self {
        self.keepdims_indexing = keepdims_indexing;
        self
    }

    /// Set whether list indices on different axes select independently (default true).
    pub fn orthogonal_indexing(&mut self, orthogonal_indexing: bool) -> &mut Self {
        self.orthogonal_indexing = orthogonal_indexing;
        self
    }

    /// Set the configuration, instead of a snapshot of the global configuration.
    pub fn config(&mut self, config: Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    /// Build into a [`Data`].
    ///
    /// # Errors
    /// Returns a [`DataError`] if
    ///  - the chunks do not match the shape,
    ///  - a cyclic axis is out of bounds,
    ///  - the units do not accept the calendar, or
    ///  - the fill value does not match the data type.
    pub fn build(&self) -> Result<Data, DataError> {
        let config = Arc::new(
            self.config
                .clone()
                .unwrap_or_else(|| global_config().clone()),
        );
        let (array, source) = match &self.source {
            DataSource::MaskedArray(array) => {
                let array = array
                    .clone()
                    .with_hard_mask(self.hardmask.unwrap_or(config.hardmask()));
                let array = match &self.chunks {
                    Some(chunks) => {
                        let grid = ChunkGrid::new(chunks.clone(), array.shape())
                            .map_err(ChunkedArrayError::from)?;
                        ChunkedArray::from_masked_array(array, Some(grid))?
                    }
                    None => ChunkedArray::from_masked_array_auto(array, config.chunk_size()),
                };
                (array, None)
            }
            DataSource::ChunkedArray(array) => (self.rechunked(array.clone())?, None),
            DataSource::Compressed(source) => (
                self.rechunked(Data::decompress(source, config.chunk_size()))?,
                Some(Arc::clone(source)),
            ),
        };

        let units = match self.calendar {
            Some(calendar) => self.units.override_calendar(Some(calendar))?,
            None => self.units.clone(),
        };
        if let Some(fill_value) = &self.fill_value {
            if fill_value.as_f64().is_some() != array.data_type().is_numeric() {
                return Err(DataError::DataType(format!(
                    "fill value {fill_value} does not match data type {}",
                    array.data_type()
                )));
            }
        }

        let mut data = Data::from_parts(array, units, config);
        data.source = source;
        if let Some(hardmask) = self.hardmask {
            data.hardmask = hardmask;
        }
        data.fill_value.clone_from(&self.fill_value);
        data.keepdims_indexing = self.keepdims_indexing;
        data.orthogonal_indexing = self.orthogonal_indexing;
        data.set_cyclic(&self.cyclic, true)?;
        tracing::debug!(
            shape = ?data.shape(),
            data_type = %data.data_type(),
            units = %data.units,
            numblocks = ?data.numblocks(),
            "built data"
        );
        Ok(data)
    }

    fn rechunked(&self, array: ChunkedArray) -> Result<ChunkedArray, DataError> {
        Ok(match &self.chunks {
            Some(chunks) => array.rechunk(chunks.clone())?,
            None => array,
        })
    }
}
