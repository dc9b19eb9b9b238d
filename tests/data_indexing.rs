use cfdata::{
    data::{Data, DataError, Index, Slice},
    units::Units,
};

fn arange(shape: &[usize]) -> Result<Data, DataError> {
    let len = shape.iter().product::<usize>();
    #[allow(clippy::cast_precision_loss)]
    let values = (0..len).map(|v| v as f64).collect();
    Data::from_vec(values, shape, Units::new("m")?)
}

fn values(data: &Data) -> Result<Vec<Option<f64>>, Box<dyn std::error::Error>> {
    Ok(data.compute()?.to_numeric_options()?)
}

#[test]
fn indexing_keeps_integer_axes() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = arange(&[3, 4])?;
    let row = data.getitem(&[Index::Integer(-1)])?;
    assert_eq!(row.shape(), vec![1, 4]);
    assert_eq!(
        values(&row)?,
        vec![Some(8.0), Some(9.0), Some(10.0), Some(11.0)]
    );

    data.set_keepdims_indexing(false);
    let column = data.getitem(&[Index::Ellipsis, Index::Integer(1)])?;
    assert_eq!(column.shape(), vec![3]);
    assert_eq!(column.axes(), &["dim0".to_string()]);
    Ok(())
}

#[test]
fn indexing_orthogonal_lists() -> Result<(), Box<dyn std::error::Error>> {
    let data = arange(&[4, 5])?;
    let subspace = data.getitem(&[Index::List(vec![0, 2]), Index::List(vec![1, 3])])?;
    assert_eq!(subspace.shape(), vec![2, 2]);
    assert_eq!(
        values(&subspace)?,
        vec![Some(1.0), Some(3.0), Some(11.0), Some(13.0)]
    );

    let selected = data.getitem(&[
        Index::Bool(vec![true, false, false, true]),
        Index::Slice(Slice::full().with_step(-2)),
    ])?;
    assert_eq!(selected.shape(), vec![2, 3]);
    assert_eq!(
        values(&selected)?,
        vec![Some(4.0), Some(2.0), Some(0.0), Some(19.0), Some(17.0), Some(15.0)]
    );

    let mut strict = data.clone();
    strict.set_orthogonal_indexing(false);
    assert!(matches!(
        strict.getitem(&[Index::List(vec![0, 2]), Index::List(vec![1, 3])]),
        Err(DataError::NotImplemented(_))
    ));
    Ok(())
}

#[test]
fn indexing_cyclic_axis_wraps() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = arange(&[2, 10])?;
    let empty = data.getitem(&[Index::Ellipsis, Index::Slice(Slice::range(-3, 4))])?;
    assert_eq!(empty.shape(), vec![2, 0]);
    data.set_cyclic(&[1], true)?;

    for (k, m) in [(3, 4), (1, 0), (5, 5)] {
        let wrapped = data.getitem(&[Index::Ellipsis, Index::Slice(Slice::range(-k, m))])?;
        let rolled = data
            .roll(1, k)?
            .getitem(&[Index::Ellipsis, Index::Slice(Slice::range(0, k + m))])?;
        assert_eq!(wrapped.shape(), rolled.shape());
        assert_eq!(values(&wrapped)?, values(&rolled)?);
    }

    let wrapped = data.getitem(&[Index::Integer(0), Index::Slice(Slice::range(-2, 3))])?;
    assert_eq!(
        values(&wrapped)?,
        vec![Some(8.0), Some(9.0), Some(0.0), Some(1.0), Some(2.0)]
    );
    assert!(!wrapped.is_cyclic(1));
    Ok(())
}

#[test]
fn indexing_empty_slice() -> Result<(), Box<dyn std::error::Error>> {
    let data = Data::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0], &[5], Units::new("m")?)?;
    let empty = data.getitem(&[Index::Slice(Slice::range(2, 2))])?;
    assert_eq!(empty.shape(), vec![0]);
    assert!(values(&empty)?.is_empty());
    Ok(())
}

#[test]
fn indexing_assignment() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = arange(&[2, 3])?;
    data.setitem(
        &[Index::Integer(1), Index::Slice(Slice::range(0, 2))],
        &Data::scalar(100.0, Units::new("cm")?),
    )?;
    assert_eq!(
        values(&data)?,
        vec![Some(0.0), Some(1.0), Some(2.0), Some(1.0), Some(1.0), Some(5.0)]
    );

    let row = Data::from_vec(vec![7.0, 8.0, 9.0], &[3], Units::new("m")?)?;
    data.setitem(&[Index::Integer(0)], &row)?;
    assert_eq!(values(&data)?[..3], [Some(7.0), Some(8.0), Some(9.0)]);

    let kelvin = Data::scalar(1.0, Units::new("K")?);
    assert!(data.setitem(&[Index::Ellipsis], &kelvin).is_err());
    let wrong_shape = Data::from_vec(vec![1.0, 2.0], &[2], Units::new("m")?)?;
    assert!(data.setitem(&[Index::Integer(0)], &wrong_shape).is_err());
    Ok(())
}

#[test]
fn indexing_with_masks() -> Result<(), Box<dyn std::error::Error>> {
    let data = arange(&[4])?;
    let condition = data.gt(&Data::scalar(1.5, Units::new("m")?))?;
    let masked = data.getitem_masked(&[condition], &[Index::Ellipsis])?;
    assert_eq!(
        values(&masked)?,
        vec![Some(0.0), Some(1.0), None, None]
    );
    Ok(())
}
