use std::{io::Write, sync::Arc};

use cfdata::{
    compressed::{CompressionType, GatheredArray, RaggedContiguousArray, Samples},
    data::{CollapseOptions, Data, Index},
    data_type::DataType,
    units::Units,
};

fn write_samples(path: &std::path::Path, values: &[f64]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytemuck::cast_slice(values))?;
    file.flush()
}

fn values(data: &Data) -> Result<Vec<Option<f64>>, Box<dyn std::error::Error>> {
    Ok(data.compute()?.to_numeric_options()?)
}

#[rustfmt::skip]
#[test]
fn compressed_ragged_contiguous_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    let directory = tempfile::TempDir::new()?;
    let path = directory.path().join("samples.bin");
    write_samples(&path, &[1.0, 2.0, 3.0, 4.0, 5.0, -99.0])?;

    let samples = Samples::from_file(&path)?.with_missing_value(Some(-99.0));
    let array = RaggedContiguousArray::new(samples, vec![2, 3, 1], DataType::Float64)?;
    let mut data = Data::from_compressed(Arc::new(array), Units::new("m")?);
    assert_eq!(data.shape(), vec![3, 3]);
    assert_eq!(data.compression_type(), CompressionType::RaggedContiguous);
    assert!(data.on_disk());

    let expected = vec![
        Some(1.0), Some(2.0), None,
        Some(3.0), Some(4.0), Some(5.0),
        None,      None,      None,
    ];
    assert_eq!(values(&data)?, expected);
    data.close();

    // rechunking does not change the elements, so the source is retained
    let rechunked = data.rechunk(vec![vec![1, 2], vec![3]])?;
    assert_eq!(rechunked.compression_type(), CompressionType::RaggedContiguous);
    let sliced = data.getitem(&[Index::Integer(1)])?;
    assert_eq!(sliced.compression_type(), CompressionType::None);
    assert_eq!(values(&sliced)?, vec![Some(3.0), Some(4.0), Some(5.0)]);

    data.to_memory()?;
    assert!(!data.on_disk());
    assert_eq!(data.compression_type(), CompressionType::RaggedContiguous);
    drop(directory);
    assert_eq!(values(&data)?, expected);

    let mean = data.mean(&CollapseOptions::default().axes(vec![1]).squeeze(true))?;
    assert_eq!(values(&mean)?, vec![Some(1.5), Some(4.0), None]);
    Ok(())
}

#[rustfmt::skip]
#[test]
fn compressed_gathered() -> Result<(), Box<dyn std::error::Error>> {
    // two times, three land points of a 2x2 grid
    let samples = Samples::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let array = GatheredArray::new(samples, vec![2, 3], 1, &[2, 2], &[0, 1, 3], DataType::Float32)?;
    let data = Data::from_compressed(Arc::new(array), Units::new("K")?);
    assert_eq!(data.shape(), vec![2, 2, 2]);
    assert_eq!(data.data_type(), DataType::Float32);
    assert_eq!(data.compression_type(), CompressionType::Gathered);
    assert!(!data.on_disk());
    assert_eq!(
        values(&data)?,
        vec![
            Some(1.0), Some(2.0), None, Some(3.0),
            Some(4.0), Some(5.0), None, Some(6.0),
        ]
    );
    let total = data.sum(&CollapseOptions::default().axes(vec![1, 2]).squeeze(true))?;
    assert_eq!(values(&total)?, vec![Some(6.0), Some(15.0)]);
    Ok(())
}
