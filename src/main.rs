use std::path::{Path, PathBuf};
use std::process;

use anyhow::anyhow;
use bytesize::ByteSize;
use simple_logger::SimpleLogger;

use large_file_sort::generate::Generator;
use large_file_sort::perftest::PerfTest;
use large_file_sort::scan_policy::ScanPolicy;
use large_file_sort::sort::Sort;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

fn main() {
    let matches = build_arg_parser().get_matches();

    let log_level: log::LevelFilter = matches.value_of_t_or_exit("log_level");
    if let Err(err) = SimpleLogger::new().with_level(log_level).init() {
        eprintln!("logger initialization error: {}", err);
        process::exit(1);
    }

    let result = match matches.subcommand() {
        Some(("generate", args)) => generate(args),
        Some(("sort", args)) => sort(args),
        Some(("check", args)) => check(args),
        Some(("perftest", args)) => perftest(args),
        _ => Err(anyhow!("a subcommand is required")),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            log::error!("{:#}", err);
            process::exit(1);
        }
    }
}

fn generate(args: &clap::ArgMatches) -> Result<bool, anyhow::Error> {
    let output = PathBuf::from(required(args, "output")?);
    let size = required(args, "size")?
        .parse::<ByteSize>()
        .map_err(|err| anyhow!("size format incorrect: {}", err))?;
    let mut generator = Generator::new(output, size.as_u64());
    if args.is_present("seed") {
        generator = generator.with_seed(args.value_of_t("seed")?);
    }
    generator.generate()?;
    Ok(true)
}

fn sort(args: &clap::ArgMatches) -> Result<bool, anyhow::Error> {
    let input = PathBuf::from(required(args, "input")?);
    let output = match args.value_of("output") {
        Some(output) => PathBuf::from(output),
        None => default_output(&input)?,
    };

    let mut sort = Sort::new(input, output);
    if let Some(tmp_dir) = args.value_of("tmp_dir") {
        sort.with_tmp_dir(PathBuf::from(tmp_dir));
    }
    if args.is_present("tasks") {
        sort.with_tasks(args.value_of_t("tasks")?);
    }
    if args.is_present("chunk_records") {
        sort.with_chunk_records(args.value_of_t("chunk_records")?);
    }
    if args.is_present("buffered_records") {
        sort.with_buffered_records(args.value_of_t("buffered_records")?);
    }
    if args.is_present("strict") {
        sort.with_scan_policy(ScanPolicy::Fail);
    }

    let report = sort.sort_with_report()?;
    log::info!(
        "Chunks: {}, flush cycles: {}, splits: {}, reorders: {}, skipped lines: {}",
        report.chunks(),
        report.flush_cycles(),
        report.splits(),
        report.reorders(),
        report.skipped_lines(),
    );
    Ok(true)
}

fn check(args: &clap::ArgMatches) -> Result<bool, anyhow::Error> {
    let input = PathBuf::from(required(args, "input")?);
    let report = Sort::new(input, PathBuf::new()).check()?;
    Ok(report.is_sorted())
}

fn perftest(args: &clap::ArgMatches) -> Result<bool, anyhow::Error> {
    let tmp = PathBuf::from(required(args, "tmp_dir")?);
    let mut perf_test = PerfTest::new(tmp);
    if args.is_present("records") {
        perf_test.with_record_counts(args.values_of_t("records")?);
    }
    if args.is_present("seed") {
        perf_test.with_seed(args.value_of_t("seed")?);
    }
    perf_test.run()?;
    Ok(true)
}

fn required<'a>(args: &'a clap::ArgMatches, name: &str) -> Result<&'a str, anyhow::Error> {
    args.value_of(name).ok_or_else(|| anyhow!("missing argument: {}", name))
}

/// `<dir>/<stem>.output.txt` next to the input
fn default_output(input: &Path) -> Result<PathBuf, anyhow::Error> {
    let stem = input.file_stem()
        .ok_or_else(|| anyhow!("Cannot derive output name from {}", input.display()))?;
    let mut name = stem.to_os_string();
    name.push(".output.txt");
    Ok(input.with_file_name(name))
}

fn build_arg_parser() -> clap::Command<'static> {
    clap::Command::new("large-file-sort")
        .about("sort large '<number>. <string>' text files")
        .subcommand_required(true)
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("log-level")
                .help("logging level")
                .takes_value(true)
                .global(true)
                .default_value("info")
                .possible_values(LOG_LEVELS),
        )
        .subcommand(
            clap::Command::new("generate")
                .about("generate a test file")
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("file to be generated")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("size")
                        .short('s')
                        .long("size")
                        .help("approximate file size, for example 100MB or 10GB")
                        .takes_value(true)
                        .default_value("100MB"),
                )
                .arg(
                    clap::Arg::new("seed")
                        .long("seed")
                        .help("random seed, for reproducible files")
                        .takes_value(true),
                ),
        )
        .subcommand(
            clap::Command::new("sort")
                .about("sort a file")
                .arg(
                    clap::Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("file to be sorted")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file, <input stem>.output.txt by default")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store temporary chunks")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("tasks")
                        .short('t')
                        .long("tasks")
                        .help("number of threads flushing chunks")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("chunk_records")
                        .short('c')
                        .long("chunk-records")
                        .help("records sorted in memory at once")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("buffered_records")
                        .short('b')
                        .long("buffered-records")
                        .help("records held in all pending buffers together")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("strict")
                        .long("strict")
                        .help("fail on lines that are not '<number>. <string>' instead of skipping them"),
                ),
        )
        .subcommand(
            clap::Command::new("check")
                .about("check the sort order of a file")
                .arg(
                    clap::Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("file to be checked")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            clap::Command::new("perftest")
                .about("measure in memory sorting and chunk file writing and reading")
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store temporary chunks")
                        .takes_value(true)
                        .default_value("."),
                )
                .arg(
                    clap::Arg::new("records")
                        .short('r')
                        .long("records")
                        .help("record counts to measure, 512K to 16M records by default")
                        .takes_value(true)
                        .multiple_values(true),
                )
                .arg(
                    clap::Arg::new("seed")
                        .long("seed")
                        .help("random seed, for reproducible records")
                        .takes_value(true),
                ),
        )
}
