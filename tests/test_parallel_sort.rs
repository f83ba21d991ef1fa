use std::fs;

use large_file_sort::generate::Generator;
use large_file_sort::sort::Sort;

mod common;

#[test]
fn test_parallel_sort() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let serial_path = common::temp_file_name("./target/parallel-results/");
    let parallel_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir_in("./target/parallel-results/")?;
    Generator::new(input_path.clone(), 500_000).with_seed(17).generate()?;

    let mut serial_sort = Sort::new(input_path.clone(), serial_path.clone());
    serial_sort.with_tasks(1);
    serial_sort.with_tmp_dir(tmp.path().to_path_buf());
    serial_sort.with_chunk_records(500);
    serial_sort.with_buffered_records(2000);
    let serial = serial_sort.sort_with_report()?;

    let mut parallel_sort = Sort::new(input_path.clone(), parallel_path.clone());
    parallel_sort.with_tasks(8);
    parallel_sort.with_tmp_dir(tmp.path().to_path_buf());
    parallel_sort.with_chunk_records(500);
    parallel_sort.with_buffered_records(2000);
    let parallel = parallel_sort.sort_with_report()?;

    assert!(serial.integrity_ok());
    assert!(parallel.integrity_ok());
    assert_eq!(serial.chunks(), parallel.chunks());
    assert_eq!(fs::read(&serial_path)?, fs::read(&parallel_path)?);
    common::assert_sorted(&common::read_lines(parallel_path.clone())?);
    assert_eq!(fs::read_dir(tmp.path())?.count(), 0);

    fs::remove_file(input_path)?;
    fs::remove_file(serial_path)?;
    fs::remove_file(parallel_path)?;
    Ok(())
}

#[test]
fn test_parallel_sort_default_tasks() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let output_path = common::temp_file_name("./target/parallel-results/");
    Generator::new(input_path.clone(), 100_000).with_seed(23).generate()?;

    let mut sort = Sort::new(input_path.clone(), output_path.clone());
    sort.with_chunk_records(256);
    let report = sort.sort_with_report()?;

    let input = common::read_lines(input_path.clone())?;
    let output = common::read_lines(output_path.clone())?;
    assert_eq!(output, common::sorted_in_memory(&input));
    assert!(report.integrity_ok());

    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}
