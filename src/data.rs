//! Lazy, unit-aware, masked N-dimensional arrays.
//!
//! A [`Data`] composes a lazy [`ChunkedArray`] with the metadata that gives its elements meaning:
//!  - the physical [`Units`] of the elements,
//!  - an identifier for each axis, and the subset of axes which are cyclic (wrap-around indexing is allowed),
//!  - the mask hardness (whether masked elements can be unmasked by assignment),
//!  - a fill value, and
//!  - the compressed source it was constructed from, for as long as the chunked array is guaranteed to be consistent with it.
//!
//! Operations never mutate elements in place.
//! They build on the lazy graph and install (or return) a new chunked array, so copies of a [`Data`] share graph nodes without interference.
//! Elements are computed by [`Data::compute`] and the other materialising methods.
//!
//! ```rust
//! # use cfdata::data::{CollapseOptions, Data, Index};
//! # use cfdata::units::Units;
//! let data = Data::masked(
//!     (0..12).map(f64::from).collect(),
//!     (0..12).map(|i| i == 4).collect(),
//!     &[4, 3],
//!     Units::new("K")?,
//! )?;
//! let maximum = data.max(&CollapseOptions::default())?;
//! assert_eq!(maximum.item()?.and_then(|v| v.as_f64()), Some(11.0));
//! let row = data.getitem(&[Index::Integer(1)])?;
//! assert_eq!(row.shape(), vec![1, 3]);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

mod axes;
mod collapse;
mod comparison;
mod data_builder;
mod data_errors;
mod indexing;
mod mask;
mod math;
mod percentile;
mod shape;
mod unit_algebra;

pub use collapse::{CollapseOptions, Weights};
pub use data_builder::DataBuilder;
pub use data_errors::DataError;
pub use indexing::{Index, Slice};
pub use mask::WhereValue;
pub use percentile::Interpolation;
pub use unit_algebra::{BinaryOperator, OperatorCategory};

use std::{collections::BTreeSet, sync::Arc};

use ndarray::{ArrayD, IxDyn};

use crate::{
    array_subset::ArraySubset,
    chunked::{ChunkedArray, ChunkedArrayError, ComputeOptions},
    compressed::{CompressedArrayTraits, CompressionType},
    config::{global_config, ComputePolicy, Config},
    data_type::DataType,
    fill_value::FillValue,
    masked_array::{Elements, MaskedArray, Scalar},
    units::{Calendar, Conversion, Units},
    ArrayShape,
};

/// A lazy, unit-aware, masked N-dimensional array.
#[derive(Debug, Clone)]
pub struct Data {
    array: ChunkedArray,
    axes: Vec<String>,
    cyclic: BTreeSet<String>,
    units: Units,
    hardmask: bool,
    source: Option<Arc<dyn CompressedArrayTraits>>,
    fill_value: Option<FillValue>,
    keepdims_indexing: bool,
    orthogonal_indexing: bool,
    config: Arc<Config>,
}

impl Data {
    fn from_parts(array: ChunkedArray, units: Units, config: Arc<Config>) -> Self {
        let axes = (0..array.ndim()).map(|axis| format!("dim{axis}")).collect();
        Self {
            array,
            axes,
            cyclic: BTreeSet::new(),
            units,
            hardmask: config.hardmask(),
            source: None,
            fill_value: None,
            keepdims_indexing: true,
            orthogonal_indexing: true,
            config,
        }
    }

    /// Create an array from an in-memory masked array, chunked by the global configuration.
    #[must_use]
    pub fn new(array: impl Into<MaskedArray>, units: Units) -> Self {
        let config = Arc::new(global_config().clone());
        let array = ChunkedArray::from_masked_array_auto(array.into(), config.chunk_size());
        Self::from_parts(array, units, config)
    }

    /// Create a `float64` array from values in row-major order.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the number of values does not match `shape`.
    pub fn from_vec(values: Vec<f64>, shape: &[usize], units: Units) -> Result<Self, DataError> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|err| DataError::Value(err.to_string()))?;
        Ok(Self::new(
            MaskedArray::from_numeric(values, DataType::Float64),
            units,
        ))
    }

    /// Create a `float64` array from values and a mask (true where missing) in row-major order.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the number of values or mask elements does not match `shape`.
    pub fn masked(
        values: Vec<f64>,
        mask: Vec<bool>,
        shape: &[usize],
        units: Units,
    ) -> Result<Self, DataError> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|err| DataError::Value(err.to_string()))?;
        let mask = ArrayD::from_shape_vec(IxDyn(shape), mask)
            .map_err(|err| DataError::Value(err.to_string()))?;
        let array = MaskedArray::new(Elements::Numeric(values), Some(mask), DataType::Float64)?;
        Ok(Self::new(array, units))
    }

    /// Create a string array from values in row-major order.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the number of values does not match `shape`.
    pub fn from_text(values: Vec<String>, shape: &[usize]) -> Result<Self, DataError> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|err| DataError::Value(err.to_string()))?;
        Ok(Self::new(MaskedArray::from_text(values), Units::undefined()))
    }

    /// Create an array filled with `value`.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if `data_type` is not numeric.
    pub fn full(
        shape: &[usize],
        value: f64,
        data_type: DataType,
        units: Units,
    ) -> Result<Self, DataError> {
        if !data_type.is_numeric() {
            return Err(DataError::DataType(format!(
                "cannot fill a {data_type} array with the number {value}"
            )));
        }
        Ok(Self::new(MaskedArray::full(shape, value, data_type), units))
    }

    /// Create an array of zeros without units.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if `data_type` is not numeric.
    pub fn zeros(shape: &[usize], data_type: DataType) -> Result<Self, DataError> {
        Self::full(shape, 0.0, data_type, Units::undefined())
    }

    /// Create an array of ones without units.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if `data_type` is not numeric.
    pub fn ones(shape: &[usize], data_type: DataType) -> Result<Self, DataError> {
        Self::full(shape, 1.0, data_type, Units::undefined())
    }

    /// Create a zero-dimensional `float64` array.
    #[must_use]
    pub fn scalar(value: f64, units: Units) -> Self {
        Self::new(
            MaskedArray::full(&[], value, DataType::Float64),
            units,
        )
    }

    /// Create an array from a compressed source.
    ///
    /// A compressed source is decompressed lazily, one chunk at a time, and retained so that [`close`](Data::close), [`on_disk`](Data::on_disk) and [`to_memory`](Data::to_memory) can delegate to it.
    #[must_use]
    pub fn from_compressed(source: Arc<dyn CompressedArrayTraits>, units: Units) -> Self {
        let config = Arc::new(global_config().clone());
        let mut data = Self::from_parts(
            Self::decompress(&source, config.chunk_size()),
            units,
            config,
        );
        data.source = Some(source);
        data
    }

    fn decompress(source: &Arc<dyn CompressedArrayTraits>, chunk_size: usize) -> ChunkedArray {
        let compression_type = source.compression_type();
        tracing::debug!(
            %compression_type,
            shape = ?source.shape(),
            on_disk = source.on_disk(),
            "decompressing source"
        );
        Arc::clone(source).to_chunked_array(chunk_size)
    }

    /// Create an array from a chunked array.
    #[must_use]
    pub fn from_chunked_array(array: ChunkedArray, units: Units) -> Self {
        Self::from_parts(array, units, Arc::new(global_config().clone()))
    }

    /// Return a copy of this array with its chunked array replaced by `array`.
    ///
    /// The compressed source is discarded, since it is no longer guaranteed to be consistent with the elements.
    /// The axis identifiers and cyclic axes are kept if the dimensionality is unchanged, otherwise they are reset.
    #[must_use]
    pub fn with_chunked_array(&self, array: ChunkedArray) -> Self {
        let mut data = self.with_chunked_array_retaining_source(array);
        data.source = None;
        data
    }

    fn with_chunked_array_retaining_source(&self, array: ChunkedArray) -> Self {
        let ndim = array.ndim();
        let mut data = Self {
            array,
            ..self.clone()
        };
        if ndim != self.ndim() {
            data.axes = (0..ndim).map(|axis| format!("dim{axis}")).collect();
            data.cyclic.clear();
        }
        data
    }

    fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    /// The underlying chunked array.
    #[must_use]
    pub fn chunked_array(&self) -> &ChunkedArray {
        &self.array
    }

    /// The configuration snapshot of this array.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.array.shape()
    }

    /// The number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.array.ndim()
    }

    /// The number of elements.
    #[must_use]
    pub fn size(&self) -> usize {
        self.array.len()
    }

    /// The data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.array.data_type()
    }

    /// The number of bytes of the elements, excluding the mask.
    #[must_use]
    pub fn nbytes(&self) -> usize {
        self.size() * self.data_type().size()
    }

    /// The chunk lengths of each axis.
    #[must_use]
    pub fn chunks(&self) -> &[Vec<usize>] {
        self.array.chunks()
    }

    /// The number of chunks along each axis.
    #[must_use]
    pub fn numblocks(&self) -> Vec<usize> {
        self.array.chunks().iter().map(Vec::len).collect()
    }

    /// The units.
    #[must_use]
    pub fn units(&self) -> &Units {
        &self.units
    }

    /// Set the units, converting the elements.
    ///
    /// If either the current or the new units are undefined, the units are replaced without conversion.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not equivalent to the current units.
    /// Use [`override_units`](Data::override_units) to change the units without conversion.
    pub fn set_units(&mut self, units: Units) -> Result<(), DataError> {
        *self = self.conformed_to(&units)?.with_units(units);
        Ok(())
    }

    /// Replace the units without converting the elements.
    pub fn override_units(&mut self, units: Units) {
        self.units = units;
    }

    /// Replace the calendar of reference time units without converting the elements.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the reference date does not exist in `calendar`.
    pub fn override_calendar(&mut self, calendar: Calendar) -> Result<(), DataError> {
        self.units = self.units.override_calendar(Some(calendar))?;
        Ok(())
    }

    /// Returns a copy with the elements converted to `units`.
    ///
    /// Conversion is skipped if either units are undefined or the conversion is the identity.
    fn conformed_to(&self, units: &Units) -> Result<Self, DataError> {
        if !self.units.is_defined() || !units.is_defined() {
            return Ok(self.clone());
        }
        let conversion = self.units.conversion(units)?;
        if conversion.is_identity() {
            return Ok(self.clone().with_units(units.clone()));
        }
        let array = self.converted(conversion)?;
        Ok(self.with_chunked_array(array).with_units(units.clone()))
    }

    fn converted(&self, conversion: Conversion) -> Result<ChunkedArray, DataError> {
        let data_type = self.float_data_type()?;
        Ok(self
            .array
            .map_blocks("convert_units", data_type, move |block| {
                Ok(block.map_numeric(data_type, false, |value| conversion.apply(value))?)
            })?)
    }

    /// The data type of floating point results computed from this array.
    fn float_data_type(&self) -> Result<DataType, DataError> {
        match self.data_type() {
            DataType::String => Err(DataError::DataType(
                "operation requires numeric elements".to_string(),
            )),
            data_type if data_type.is_float() => Ok(data_type),
            _ => Ok(DataType::Float64),
        }
    }

    fn require_numeric(&self, operation: &str) -> Result<(), DataError> {
        if self.data_type().is_numeric() {
            Ok(())
        } else {
            Err(DataError::DataType(format!(
                "{operation} is not supported for {} elements",
                self.data_type()
            )))
        }
    }

    /// The fill value.
    ///
    /// Returns [`None`] if no fill value has been set, in which case the default of the [fill policy](crate::config::Config#fill-policy) is used.
    #[must_use]
    pub fn fill_value(&self) -> Option<&FillValue> {
        self.fill_value.as_ref()
    }

    /// Set the fill value.
    pub fn set_fill_value(&mut self, fill_value: Option<FillValue>) {
        self.fill_value = fill_value;
    }

    /// Returns true if an integer index keeps its axis as an axis of length one.
    ///
    /// This is the default, so indexing never changes the dimensionality.
    #[must_use]
    pub fn keepdims_indexing(&self) -> bool {
        self.keepdims_indexing
    }

    /// Set whether an integer index keeps its axis.
    pub fn set_keepdims_indexing(&mut self, keepdims_indexing: bool) {
        self.keepdims_indexing = keepdims_indexing;
    }

    /// Returns true if list indices on different axes select independently (the default).
    #[must_use]
    pub fn orthogonal_indexing(&self) -> bool {
        self.orthogonal_indexing
    }

    /// Set whether list indices on different axes select independently.
    ///
    /// Indexing with more than one list index fails if this is false.
    pub fn set_orthogonal_indexing(&mut self, orthogonal_indexing: bool) {
        self.orthogonal_indexing = orthogonal_indexing;
    }

    fn compute_options(&self) -> ComputeOptions {
        ComputeOptions::new(self.config.chunk_concurrent_limit())
    }

    /// Returns true if the lazy graph may be computed implicitly.
    ///
    /// This is the case if the graph only slices, copies, concatenates or reshapes its sources, or the configuration allows any computation.
    #[must_use]
    pub fn can_compute(&self) -> bool {
        self.config.debug()
            || self.config.compute_policy() == ComputePolicy::Always
            || self.array.is_cheap()
    }

    /// Compute the elements.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the lazy graph fails to evaluate.
    pub fn compute(&self) -> Result<MaskedArray, DataError> {
        let array = self.array.compute_opt(&self.compute_options())?;
        Ok(array.with_hard_mask(self.hardmask))
    }

    /// Compute the numeric elements, with missing elements set to the fill value.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the elements are not numeric or the lazy graph fails to evaluate.
    pub fn array(&self) -> Result<ArrayD<f64>, DataError> {
        let fill_value = self.effective_fill_value();
        let fill_value = fill_value.as_f64().ok_or_else(|| {
            DataError::DataType(format!("fill value {fill_value} is not numeric"))
        })?;
        Ok(self.compute()?.filled_numeric(fill_value)?)
    }

    fn effective_fill_value(&self) -> FillValue {
        self.fill_value.clone().unwrap_or_else(|| {
            FillValue::default_for(self.data_type(), self.config.fill_policy())
        })
    }

    /// The single element of an array of size one, or [`None`] if it is masked.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the array does not have exactly one element.
    pub fn item(&self) -> Result<Option<Scalar>, DataError> {
        if self.size() != 1 {
            return Err(DataError::Value(format!(
                "only an array of size one can be converted to a single element, got shape {:?}",
                self.shape()
            )));
        }
        self.element(0)
    }

    /// The truth value of an array of size one. A masked element is false.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the array does not have exactly one element.
    pub fn to_bool(&self) -> Result<bool, DataError> {
        Ok(match self.item()? {
            Some(Scalar::Numeric(value)) => value != 0.0,
            Some(Scalar::Text(value)) => !value.is_empty(),
            None => false,
        })
    }

    fn element(&self, flat_index: usize) -> Result<Option<Scalar>, DataError> {
        let shape = self.shape();
        if flat_index >= self.size() {
            return Err(DataError::Index(format!(
                "element {flat_index} is out of bounds for shape {shape:?}"
            )));
        }
        let mut start = vec![0; shape.len()];
        let mut remainder = flat_index;
        for (index, len) in std::iter::zip(start.iter_mut(), &shape).rev() {
            *index = remainder % len;
            remainder /= len;
        }
        let subset = ArraySubset::new_with_start_shape(start, vec![1; shape.len()])
            .map_err(ChunkedArrayError::from)?;
        let block = self.array.retrieve_subset_opt(&subset, &self.compute_options())?;
        Ok(block.get(&vec![0; shape.len()]))
    }

    fn gated_element(
        &self,
        name: &'static str,
        flat_index: usize,
    ) -> Result<Option<Scalar>, DataError> {
        if !self.can_compute() {
            return Err(DataError::Compute(name));
        }
        self.element(flat_index)
    }

    /// The first element in row-major order, or [`None`] if it is masked.
    ///
    /// # Errors
    /// Returns [`DataError::Compute`] if the lazy graph [cannot be computed implicitly](Data::can_compute), or [`DataError::Index`] if the array is empty.
    pub fn first_element(&self) -> Result<Option<Scalar>, DataError> {
        self.gated_element("first_element", 0)
    }

    /// The second element in row-major order, or [`None`] if it is masked.
    ///
    /// # Errors
    /// Returns [`DataError::Compute`] if the lazy graph [cannot be computed implicitly](Data::can_compute), or [`DataError::Index`] if the array has fewer than two elements.
    pub fn second_element(&self) -> Result<Option<Scalar>, DataError> {
        self.gated_element("second_element", 1)
    }

    /// The last element in row-major order, or [`None`] if it is masked.
    ///
    /// # Errors
    /// Returns [`DataError::Compute`] if the lazy graph [cannot be computed implicitly](Data::can_compute), or [`DataError::Index`] if the array is empty.
    pub fn last_element(&self) -> Result<Option<Scalar>, DataError> {
        let last = self
            .size()
            .checked_sub(1)
            .ok_or_else(|| DataError::Index("an empty array has no last element".to_string()))?;
        self.gated_element("last_element", last)
    }

    /// The type of compression of the retained source, [`CompressionType::None`] if there is none.
    #[must_use]
    pub fn compression_type(&self) -> CompressionType {
        self.source
            .as_ref()
            .map_or(CompressionType::None, |source| source.compression_type())
    }

    /// Returns true if the retained source reads its elements from a file.
    #[must_use]
    pub fn on_disk(&self) -> bool {
        self.source.as_ref().is_some_and(|source| source.on_disk())
    }

    /// Close any open file of the retained source.
    ///
    /// The file is reopened if elements are read from it again.
    pub fn close(&self) {
        if let Some(source) = &self.source {
            source.close();
        }
    }

    /// Load a retained on-disk source into memory.
    ///
    /// # Errors
    /// Returns [`DataError::Compressed`] if the source cannot be read.
    pub fn to_memory(&mut self) -> Result<(), DataError> {
        let Some(source) = self.source.as_ref().filter(|source| source.on_disk()) else {
            return Ok(());
        };
        let source = source.to_memory()?;
        let array = Self::decompress(&source, self.config.chunk_size())
            .rechunk(self.chunks().to_vec())?;
        self.array = array;
        self.source = Some(source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn arange(shape: &[usize]) -> Data {
        let n = shape.iter().product::<usize>();
        #[allow(clippy::cast_precision_loss)]
        Data::from_vec((0..n).map(|i| i as f64).collect(), shape, Units::undefined()).unwrap()
    }

    #[test]
    fn data_attributes() {
        let data = DataBuilder::new(MaskedArray::full(&[4, 6], 1.0, DataType::Float32))
            .chunks(vec![vec![2, 2], vec![3, 3]])
            .units(Units::new("m").unwrap())
            .build()
            .unwrap();
        assert_eq!(data.shape(), vec![4, 6]);
        assert_eq!(data.ndim(), 2);
        assert_eq!(data.size(), 24);
        assert_eq!(data.nbytes(), 96);
        assert_eq!(data.numblocks(), vec![2, 2]);
        assert_eq!(data.axes(), &["dim0".to_string(), "dim1".to_string()]);
        assert_eq!(data.units().as_str(), "m");
        assert!(data.hardmask());
    }

    #[test]
    fn data_elements() {
        let data = arange(&[2, 3]);
        assert_eq!(data.first_element().unwrap(), Some(Scalar::Numeric(0.0)));
        assert_eq!(data.second_element().unwrap(), Some(Scalar::Numeric(1.0)));
        assert_eq!(data.last_element().unwrap(), Some(Scalar::Numeric(5.0)));
        assert!(data.item().is_err());
        assert!(Data::scalar(2.0, Units::undefined()).to_bool().unwrap());
    }

    #[test]
    fn data_can_compute() {
        let data = arange(&[4]);
        let sliced = data.getitem(&[Index::from(1..3)]).unwrap();
        assert!(sliced.can_compute());
        let summed = data.sum(&CollapseOptions::default()).unwrap();
        assert!(!summed.can_compute());
        assert!(matches!(
            summed.first_element(),
            Err(DataError::Compute("first_element"))
        ));
        assert_eq!(summed.item().unwrap(), Some(Scalar::Numeric(6.0)));

        let mut config = Config::default();
        config.set_debug(true);
        let summed = DataBuilder::new(MaskedArray::full(&[4], 1.0, DataType::Float64))
            .config(config)
            .build()
            .unwrap()
            .sum(&CollapseOptions::default())
            .unwrap();
        assert_eq!(summed.first_element().unwrap(), Some(Scalar::Numeric(4.0)));
    }

    #[test]
    fn data_set_units() {
        let mut data = Data::from_vec(vec![1.0, 2.0], &[2], Units::new("km").unwrap()).unwrap();
        data.set_units(Units::new("m").unwrap()).unwrap();
        assert_eq!(data.array().unwrap().iter().copied().collect::<Vec<_>>(), vec![1000.0, 2000.0]);
        assert!(data.set_units(Units::new("s").unwrap()).is_err());
        assert_eq!(data.units().as_str(), "m");
        data.override_units(Units::new("s").unwrap());
        assert_eq!(data.array().unwrap().iter().copied().collect::<Vec<_>>(), vec![1000.0, 2000.0]);
    }
}
