#[cfg(not(feature = "cli"))]
compile_error!("The `ibdrow` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use ibdrow::cli;
use ibdrow::cli::app::{Bounds, Cli, ColorMode, Commands, TableSource};
use ibdrow::query::reader::{parse_time_zone, ReaderConfig};
use ibdrow::IdbError;
use tracing_subscriber::EnvFilter;

fn table_options(file: String, source: TableSource, config: ReaderConfig) -> cli::TableOptions {
    cli::TableOptions {
        file,
        table: if source.sdi { None } else { source.table },
        config,
    }
}

fn run(cli: Cli, writer: &mut dyn Write) -> Result<(), IdbError> {
    let config = ReaderConfig::default()
        .with_time_zone(parse_time_zone(&cli.tz)?)
        .with_verify_checksums(cli.verify_checksums);

    match cli.command {
        Commands::Pages {
            file,
            headers_only,
            json,
        } => cli::pages::execute(
            &cli::pages::PagesOptions {
                file,
                headers_only,
                verify_checksums: cli.verify_checksums,
                json,
            },
            writer,
        ),

        Commands::Page {
            file,
            page,
            hex,
            json,
        } => cli::page::execute(
            &cli::page::PageOptions {
                file,
                page,
                hex,
                verify_checksums: cli.verify_checksums,
                json,
            },
            writer,
        ),

        Commands::Rows {
            file,
            source,
            page,
            include_deleted,
            json,
        } => cli::rows::execute(
            &cli::rows::RowsOptions {
                table: table_options(file, source, config.with_include_deleted(include_deleted)),
                page,
                json,
            },
            writer,
        ),

        Commands::Get {
            file,
            source,
            key,
            root_page,
            json,
        } => {
            let config = match root_page {
                Some(p) => config.with_root_page(p),
                None => config,
            };
            cli::get::execute(
                &cli::get::GetOptions {
                    table: table_options(file, source, config),
                    key,
                    json,
                },
                writer,
            )
        }

        Commands::Range {
            file,
            source,
            bounds,
            root_page,
            include_deleted,
            json,
        } => {
            let config = match root_page {
                Some(p) => config.with_root_page(p),
                None => config,
            }
            .with_include_deleted(include_deleted);
            let Bounds {
                gt,
                gte,
                lt,
                lte,
                reverse,
                columns,
                limit,
            } = bounds;
            cli::range::execute(
                &cli::range::RangeOptions {
                    table: table_options(file, source, config),
                    gt,
                    gte,
                    lt,
                    lte,
                    reverse,
                    columns,
                    limit,
                    json,
                },
                writer,
            )
        }

        Commands::Index {
            file,
            source,
            index,
            bounds,
            root_page,
            no_discover,
            json,
        } => {
            let Bounds {
                gt,
                gte,
                lt,
                lte,
                reverse,
                columns,
                limit,
            } = bounds;
            cli::index::execute(
                &cli::index::IndexOptions {
                    table: table_options(
                        file,
                        source,
                        config.with_discover_index_roots(!no_discover),
                    ),
                    index,
                    gt,
                    gte,
                    lt,
                    lte,
                    reverse,
                    columns,
                    limit,
                    root_page,
                    json,
                },
                writer,
            )
        }

        Commands::Sdi {
            file,
            table_def,
            pretty,
        } => cli::sdi::execute(
            &cli::sdi::SdiOptions {
                file,
                table_def,
                pretty,
                verify_checksums: cli.verify_checksums,
            },
            writer,
        ),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "ibdrow", writer);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ibdrow={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, IdbError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| IdbError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = run(cli, writer.as_mut()).and_then(|()| {
        writer
            .flush()
            .map_err(|e| IdbError::Io(format!("Cannot flush output: {}", e)))
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
