//! Whole-array comparison within tolerance.

use crate::{chunked::ChunkedArray, data_type::DataType, masked_array::Elements, units::Units};

use super::{unit_algebra::isclose, Data, DataError};

impl Data {
    fn tolerances(&self, atol: Option<f64>, rtol: Option<f64>) -> (f64, f64) {
        (
            atol.unwrap_or_else(|| self.config.atol()),
            rtol.unwrap_or_else(|| self.config.rtol()),
        )
    }

    /// Returns true if `other` has the same shape, units, data type (unless `ignore_data_type`), mask and elements.
    ///
    /// Numeric elements are compared within the [configured](crate::config::Config#atol) tolerances, and text elements exactly.
    /// The reason for a false result is logged at the info level.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the lazy graph of either array fails to evaluate.
    pub fn equals(&self, other: &Self, ignore_data_type: bool) -> Result<bool, DataError> {
        if self.shape() != other.shape() {
            tracing::info!(
                shape = ?self.shape(),
                other = ?other.shape(),
                "different shapes"
            );
            return Ok(false);
        }
        let same_units = match (self.units.is_defined(), other.units.is_defined()) {
            (true, true) => self.units.equals(&other.units),
            (defined, other_defined) => defined == other_defined,
        };
        if !same_units {
            tracing::info!(units = %self.units, other = %other.units, "different units");
            return Ok(false);
        }
        if !ignore_data_type && self.data_type() != other.data_type() {
            tracing::info!(
                data_type = %self.data_type(),
                other = %other.data_type(),
                "different data types"
            );
            return Ok(false);
        }

        let a = self
            .enforce_mask_hardness()?
            .compute_opt(&self.compute_options())?;
        let b = other
            .enforce_mask_hardness()?
            .compute_opt(&other.compute_options())?;
        if a.mask_or_false() != b.mask_or_false() {
            tracing::info!("different masks");
            return Ok(false);
        }
        let (atol, rtol) = self.tolerances(None, None);
        let mask = a.mask_or_false();
        let equal = match (a.elements(), b.elements()) {
            (Elements::Numeric(x), Elements::Numeric(y)) => itertools::izip!(x, y, &mask)
                .all(|(x, y, masked)| *masked || isclose(*x, *y, atol, rtol)),
            (Elements::Text(x), Elements::Text(y)) => {
                itertools::izip!(x, y, &mask).all(|(x, y, masked)| *masked || x == y)
            }
            _ => false,
        };
        if !equal {
            tracing::info!(atol, rtol, "different elements");
        }
        Ok(equal)
    }

    /// Elementwise closeness to `other`, `|a - b| <= atol + rtol * |b|`, with the [configured](crate::config::Config#atol) tolerances by default.
    ///
    /// `other` is converted to these units. The result is boolean without units, and masked where either array is masked.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not equivalent, or another [`DataError`] if the shapes do not broadcast.
    pub fn isclose(
        &self,
        other: &Self,
        atol: Option<f64>,
        rtol: Option<f64>,
    ) -> Result<Self, DataError> {
        let (atol, rtol) = self.tolerances(atol, rtol);
        let other = other.conformed_to(&self.units)?;
        let array = ChunkedArray::elementwise(
            "isclose",
            &[&self.array, &other.array],
            DataType::Bool,
            move |blocks, _| {
                Ok(blocks[0].zip_compare(
                    &blocks[1],
                    |a, b| isclose(a, b, atol, rtol),
                    |a, b| a == b,
                )?)
            },
        )?;
        let shape = array.shape();
        let data = if shape == self.shape() {
            self.with_chunked_array(array)
        } else {
            Self::from_parts(array, Units::undefined(), self.config.clone())
        };
        let mut data = data.with_units(Units::undefined());
        data.fill_value = None;
        Ok(data)
    }

    /// Returns true if every pair of non-missing elements is [close](Data::isclose).
    ///
    /// # Errors
    /// See [`isclose`](Data::isclose).
    pub fn allclose(
        &self,
        other: &Self,
        atol: Option<f64>,
        rtol: Option<f64>,
    ) -> Result<bool, DataError> {
        self.isclose(other, atol, rtol)?.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(values: &[f64], units: &str) -> Data {
        Data::from_vec(values.to_vec(), &[values.len()], Units::new(units).unwrap()).unwrap()
    }

    #[test]
    fn comparison_equals() {
        let a = data(&[1.0, 2.0, 3.0], "m");
        assert!(a.equals(&a.clone(), false).unwrap());
        assert!(!a.equals(&data(&[1.0, 2.0], "m"), false).unwrap());
        assert!(!a.equals(&data(&[1.0, 2.0, 3.0], "km"), false).unwrap());
        assert!(!a.equals(&data(&[1.0, 2.0, 3.0], ""), false).unwrap());
        assert!(!a.equals(&data(&[1.0, 2.0, 3.5], "m"), false).unwrap());

        let integers = a.astype(DataType::Int32).unwrap();
        assert!(!a.equals(&integers, false).unwrap());
        assert!(a.equals(&integers, true).unwrap());

        let masked = Data::masked(
            vec![1.0, 9.0, 3.0],
            vec![false, true, false],
            &[3],
            Units::new("m").unwrap(),
        )
        .unwrap();
        let other = Data::masked(
            vec![1.0, 2.0, 3.0],
            vec![false, true, false],
            &[3],
            Units::new("m").unwrap(),
        )
        .unwrap();
        assert!(masked.equals(&other, false).unwrap());
        assert!(!masked.equals(&a, false).unwrap());

        let mut hard = masked.clone();
        hard.harden_mask();
        assert!(hard.equals(&other, false).unwrap());
        assert!(other.equals(&hard, false).unwrap());
        assert!(!hard.equals(&a, false).unwrap());
    }

    #[test]
    fn comparison_isclose() {
        let a = data(&[1.0, 2.0, 3.0], "m");
        let b = data(&[100.0, 201.0, 300.0], "cm");
        let close = a.isclose(&b, Some(1e-9), Some(0.0)).unwrap();
        assert_eq!(close.data_type(), DataType::Bool);
        assert_eq!(
            close.compute().unwrap().to_numeric_options().unwrap(),
            vec![Some(1.0), Some(0.0), Some(1.0)]
        );
        assert!(!a.allclose(&b, None, None).unwrap());
        assert!(a.allclose(&b, Some(0.1), None).unwrap());
        assert!(a.isclose(&data(&[1.0], "K"), None, None).is_err());
    }
}
