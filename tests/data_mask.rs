use cfdata::{
    data::{Data, Index, Slice, WhereValue},
    fill_value::FillValue,
    units::Units,
};

fn grid() -> Result<Data, Box<dyn std::error::Error>> {
    Ok(Data::masked(
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        vec![false, true, false, false, false, true],
        &[2, 3],
        Units::new("K")?,
    )?)
}

fn values(data: &Data) -> Result<Vec<Option<f64>>, Box<dyn std::error::Error>> {
    Ok(data.compute()?.to_numeric_options()?)
}

#[test]
fn mask_hard_assignment() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = grid()?;
    data.harden_mask();
    data.setitem(&[Index::Ellipsis], &Data::scalar(-1.0, Units::new("K")?))?;
    assert_eq!(
        values(&data)?,
        vec![Some(-1.0), None, Some(-1.0), Some(-1.0), Some(-1.0), None]
    );

    // masking is allowed with a hard mask
    let missing = Data::masked(vec![0.0], vec![true], &[1], Units::new("K")?)?;
    data.setitem(&[Index::Integer(1), Index::Integer(0)], &missing)?;
    assert_eq!(data.count_masked()?, 3);

    data.soften_mask();
    data.setitem(
        &[Index::Ellipsis, Index::Slice(Slice::range(1, 3))],
        &Data::scalar(7.0, Units::new("K")?),
    )?;
    assert_eq!(
        values(&data)?,
        vec![Some(-1.0), Some(7.0), Some(7.0), None, Some(7.0), Some(7.0)]
    );
    Ok(())
}

#[test]
fn mask_counts_and_filling() -> Result<(), Box<dyn std::error::Error>> {
    let data = grid()?;
    assert!(data.is_masked()?);
    let counts = data.count(Some(&[1]))?;
    assert_eq!(counts.shape(), vec![2, 1]);
    assert_eq!(values(&counts)?, vec![Some(2.0), Some(2.0)]);

    let filled = data.filled(Some(FillValue::Numeric(-999.0)))?;
    assert!(!filled.is_masked()?);
    assert_eq!(
        values(&filled)?,
        vec![Some(0.0), Some(-999.0), Some(2.0), Some(3.0), Some(4.0), Some(-999.0)]
    );
    assert!(data.filled(Some(FillValue::Text("x".to_string()))).is_err());
    Ok(())
}

#[test]
fn mask_where_and_invalid() -> Result<(), Box<dyn std::error::Error>> {
    let data = Data::from_vec(vec![1.0, f64::NAN, 3.0, f64::INFINITY], &[4], Units::undefined())?;
    let valid = data.masked_invalid()?;
    assert_eq!(values(&valid)?, vec![Some(1.0), None, Some(3.0), None]);

    let condition = valid.gt(&Data::scalar(2.0, Units::undefined()))?;
    let mut soft = valid.clone();
    soft.soften_mask();
    let replaced = soft.where_(
        &condition,
        Some(WhereValue::Masked),
        Some(Data::scalar(0.0, Units::undefined()).into()),
    )?;
    // missing elements of the condition are false
    assert_eq!(
        values(&replaced)?,
        vec![Some(0.0), Some(0.0), None, Some(0.0)]
    );
    Ok(())
}
