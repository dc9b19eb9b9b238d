use cfdata::{
    data::{CollapseOptions, Data, Interpolation, Weights},
    units::Units,
};

fn masked_example() -> Result<Data, Box<dyn std::error::Error>> {
    Ok(Data::masked(
        (0..12).map(f64::from).collect(),
        (0..12).map(|i| i == 4).collect(),
        &[4, 3],
        Units::new("K")?,
    )?)
}

fn item(data: &Data) -> Result<Option<f64>, Box<dyn std::error::Error>> {
    Ok(data.item()?.and_then(|value| value.as_f64()))
}

fn values(data: &Data) -> Result<Vec<Option<f64>>, Box<dyn std::error::Error>> {
    Ok(data.compute()?.to_numeric_options()?)
}

#[test]
fn collapse_masked_statistics() -> Result<(), Box<dyn std::error::Error>> {
    let data = masked_example()?;
    let options = CollapseOptions::default();

    let maximum = data.max(&options)?;
    assert_eq!(maximum.shape(), vec![1, 1]);
    let squeezed = data.max(&options.clone().squeeze(true))?;
    assert_eq!(squeezed.shape(), Vec::<usize>::new());
    assert_eq!(item(&maximum)?, Some(11.0));
    assert_eq!(item(&data.min(&options)?)?, Some(0.0));

    let mean = item(&data.mean(&options)?)?.ok_or("masked mean")?;
    assert!((mean - 5.636_363_636_363_637).abs() < 1e-12);
    assert_eq!(data.mean(&options)?.units().as_str(), "K");

    assert_eq!(item(&data.sample_size(&options)?)?, Some(11.0));
    assert_eq!(item(&data.range(&options)?)?, Some(11.0));
    assert_eq!(item(&data.mid_range(&options)?)?, Some(5.5));
    Ok(())
}

#[test]
fn collapse_derived_statistics() -> Result<(), Box<dyn std::error::Error>> {
    let data = Data::from_vec(vec![-3.0, 1.0, -4.0, 2.0], &[4], Units::new("m")?)?;
    let options = CollapseOptions::default();

    let squares = data.sum_of_squares(&options)?;
    assert_eq!(item(&squares)?, Some(30.0));
    assert!(squares.units().equivalent(&Units::new("m^2")?));

    let rms = data.root_mean_square(&options)?;
    let value = item(&rms)?.ok_or("masked root mean square")?;
    assert!((value - 7.5_f64.sqrt()).abs() < 1e-12);
    assert_eq!(rms.units().as_str(), "m");

    let mean_abs = data.mean_absolute_value(&options)?;
    assert_eq!(item(&mean_abs)?, Some(2.5));
    assert_eq!(mean_abs.units().as_str(), "m");

    let max_abs = data.max_abs(&options)?;
    assert_eq!(item(&max_abs)?, Some(4.0));
    assert_eq!(max_abs.units().as_str(), "m");
    let min_abs = data.min_abs(&options)?;
    assert_eq!(item(&min_abs)?, Some(1.0));
    assert_eq!(min_abs.units().as_str(), "m");
    Ok(())
}

#[test]
fn collapse_keeps_axes_unless_squeezed() -> Result<(), Box<dyn std::error::Error>> {
    let data = masked_example()?;
    let kept = data.sum(&CollapseOptions::default().axes(vec![0]))?;
    assert_eq!(kept.shape(), vec![1, 3]);
    assert_eq!(values(&kept)?, vec![Some(18.0), Some(18.0), Some(26.0)]);

    let squeezed = data.sum(&CollapseOptions::default().axes(vec![0]).squeeze(true))?;
    assert_eq!(squeezed.shape(), vec![3]);
    Ok(())
}

#[test]
fn collapse_mtol() -> Result<(), Box<dyn std::error::Error>> {
    let data = masked_example()?;
    let options = CollapseOptions::default().axes(vec![1]);
    // row 1 has one of three elements masked
    let strict = data.max(&options.clone().mtol(0.0))?;
    assert_eq!(values(&strict)?, vec![Some(2.0), None, Some(8.0), Some(11.0)]);
    let lenient = data.max(&options.clone().mtol(0.5))?;
    assert_eq!(values(&lenient)?[1], Some(5.0));
    assert!(data.max(&options.mtol(1.5)).is_err());
    Ok(())
}

#[test]
fn collapse_weighted_mean() -> Result<(), Box<dyn std::error::Error>> {
    let data = Data::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], Units::new("m")?)?;
    let weights = Data::from_vec(vec![1.0, 3.0], &[2], Units::undefined())?;
    let options = CollapseOptions::default()
        .axes(vec![1])
        .weights(Weights::Axes(vec![(vec![1], weights)]));
    assert_eq!(
        values(&data.mean(&options)?)?,
        vec![Some(1.75), Some(3.75)]
    );
    Ok(())
}

#[test]
fn collapse_variance_units() -> Result<(), Box<dyn std::error::Error>> {
    let data = Data::from_vec(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], &[8], Units::new("m")?)?;
    let variance = data.var(&CollapseOptions::default())?;
    assert_eq!(item(&variance)?, Some(4.0));
    assert!(variance.units().equals(&Units::new("m2")?));
    let deviation = data.std(&CollapseOptions::default())?;
    assert_eq!(item(&deviation)?, Some(2.0));
    assert!(deviation.units().equals(&Units::new("m")?));
    Ok(())
}

#[test]
fn collapse_median() -> Result<(), Box<dyn std::error::Error>> {
    let data = masked_example()?;
    let median = data.median(&CollapseOptions::default())?;
    assert_eq!(item(&median)?, Some(6.0));
    let quartiles = data.percentile(
        &[25.0, 75.0],
        &CollapseOptions::default().axes(vec![0]).squeeze(true),
        Interpolation::Lower,
    )?;
    assert_eq!(quartiles.shape(), vec![2, 3]);
    Ok(())
}
