use clap::Parser;
use log::error;
use mri2mrs_core::cli::{Cli, OutputFormat};
use mri2mrs_core::context::log_file_name;
use mri2mrs_core::{Pipeline, PipelineError, ProcessRunner, RunReport, TextReport, Toolset};
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    let toolset = match Toolset::from_env() {
        Ok(toolset) => toolset,
        Err(e) => {
            eprintln!("Error: Failed to determine the current directory: {}", e);
            process::exit(1);
        }
    };
    let toolset = match &cli.script_dir {
        Some(dir) => match toolset.with_script_dir(dir) {
            Ok(toolset) => toolset,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(e.exit_code());
            }
        },
        None => toolset,
    };

    let options = cli.pipeline_options();
    let runner = ProcessRunner;

    match Pipeline::new(&toolset, &runner).run(&options) {
        Ok(report) => {
            println!(
                "Program finished, see {} for details",
                report.log_path.display()
            );
            output_report(&report, cli.format);
        }
        Err(e) => {
            report_failure(&e, &options.out_dir.join(log_file_name(&options.case_id)));
            process::exit(e.exit_code());
        }
    }
}

fn setup_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

fn report_failure(err: &PipelineError, log_path: &std::path::Path) {
    error!("Run failed: {}", err);
    match err.phase() {
        Some(phase) => eprintln!("Error in stage {}: {}", phase, err),
        None => eprintln!("Error: {}", err),
    }
    if let PipelineError::ToolFailed { stderr, .. } = err {
        if !stderr.trim().is_empty() {
            eprintln!("{}", stderr.trim_end());
        }
    }
    if log_path.is_file() {
        eprintln!("See {} for details", log_path.display());
    }
}

fn output_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(report));
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match serde_json::to_string_pretty(report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}
