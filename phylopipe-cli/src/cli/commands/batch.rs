use crate::cli::options::{cancel_on_interrupt, load_settings, pipeline_builder, runtime, ConfigArgs};
use crate::cli::GlobalOptions;
use anyhow::Context;
use clap::Args;
use comfy_table::Cell;
use phylopipe_pipeline::{BatchOutcome, BatchRunner, CancelSignal};
use phylopipe_utils::{
    create_standard_table, format_duration, header_cell, info, section_header, status_cell,
    success, warning, TracingReporter,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct BatchArgs {
    /// Query files (FASTA); each gets its own output subdirectory
    #[arg(short, long = "query", value_name = "FILE", num_args = 1.., required = true)]
    pub queries: Vec<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory receiving one subdirectory per query and batch_report.json
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Pipelines running at the same time
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Keep every run workspace and its intermediate files
    #[arg(long)]
    pub keep_intermediates: bool,
}

pub fn run(args: BatchArgs, global: &GlobalOptions) -> anyhow::Result<i32> {
    let settings = load_settings(global)?;
    let cancel = CancelSignal::new();
    let pipeline = pipeline_builder(&settings, args.keep_intermediates, cancel.clone())?
        .reporter(Arc::new(TracingReporter))
        .build();
    let config = args.config.resolve(pipeline.registries())?;

    let peak = config.peak_threads() * args.workers.max(1);
    if peak > config.resource_limits.max_threads {
        warning(&format!(
            "{} workers may use up to {} threads together; each run is checked alone",
            args.workers, peak
        ));
    }

    info(&format!(
        "Running {} queries with {} worker(s)",
        args.queries.len(),
        args.workers.max(1)
    ));

    let runtime = runtime()?;
    let outcome = runtime.block_on(async {
        cancel_on_interrupt(&cancel);
        BatchRunner::new(&pipeline, args.workers)
            .run(&config, &args.queries, &args.output_dir)
            .await
    });

    let report = outcome
        .write_report(&args.output_dir)
        .context("failed to write the batch report")?;

    print_outcome(&outcome);
    info(&format!("Batch report: {}", report.display()));
    Ok(outcome.exit_code())
}

fn print_outcome(outcome: &BatchOutcome) {
    section_header("Batch summary");

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Query"),
        header_cell("Status"),
        header_cell("Exit"),
        header_cell("Elapsed"),
        header_cell("Output"),
    ]);
    for run in &outcome.runs {
        table.add_row(vec![
            Cell::new(run.query.display()),
            status_cell(run.succeeded(), "succeeded", &run.status.to_string()),
            Cell::new(run.exit_code()),
            Cell::new(format_duration(run.elapsed)),
            Cell::new(run.output_dir.display()),
        ]);
    }
    println!("{}", table);

    let line = format!(
        "{} of {} runs succeeded in {}",
        outcome.succeeded(),
        outcome.runs.len(),
        format_duration(outcome.elapsed)
    );
    if outcome.failed() == 0 {
        success(&line);
    } else {
        warning(&line);
    }
}
