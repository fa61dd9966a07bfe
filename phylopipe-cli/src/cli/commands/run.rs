use crate::cli::options::{cancel_on_interrupt, load_settings, pipeline_builder, runtime, ConfigArgs};
use crate::cli::GlobalOptions;
use clap::Args;
use comfy_table::Cell;
use phylopipe_core::RunStatus;
use phylopipe_pipeline::{CancelSignal, PipelineRun};
use phylopipe_utils::{
    create_standard_table, error, format_duration, format_number, header_cell, section_header,
    status_cell, tree_item, ConsoleReporter, ProgressReporter, TracingReporter,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct RunArgs {
    /// Query sequences (FASTA)
    #[arg(short, long, value_name = "FILE")]
    pub query: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory for search_hits.tsv, alignment.fasta, tree.nwk and run_report.json
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Keep the run workspace and every intermediate file
    #[arg(long)]
    pub keep_intermediates: bool,
}

pub fn run(args: RunArgs, global: &GlobalOptions) -> anyhow::Result<i32> {
    let settings = load_settings(global)?;
    let cancel = CancelSignal::new();

    // log lines and a spinner fight over the terminal
    let reporter: Arc<dyn ProgressReporter> = if global.verbose > 0 {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    };
    let pipeline = pipeline_builder(&settings, args.keep_intermediates, cancel.clone())?
        .reporter(reporter)
        .build();
    let config = args.config.resolve(pipeline.registries())?;
    tracing::debug!(preset = %args.config.preset, ?config, "resolved configuration");

    let runtime = runtime()?;
    let run = runtime.block_on(async {
        cancel_on_interrupt(&cancel);
        pipeline.run(&config, &args.query, &args.output_dir).await
    });

    print_run(&run);
    Ok(run.exit_code())
}

fn print_run(run: &PipelineRun) {
    section_header("Run summary");
    tree_item("Run", &run.id, false);
    tree_item("Status", run.status, false);

    if let Some(search) = &run.search {
        tree_item(
            "Search",
            format!(
                "{} hits from {} ({})",
                format_number(search.hits),
                search.database,
                search.source
            ),
            false,
        );
    }
    if let Some(alignment) = &run.alignment {
        tree_item(
            "Alignment",
            format!(
                "{} records x {} columns, {:.1}% gaps",
                alignment.records,
                format_number(alignment.length),
                alignment.gap_fraction * 100.0
            ),
            false,
        );
    }
    if let Some(tree) = &run.tree {
        let bootstrap = if tree.bootstrap_replicates > 0 {
            format!(", {} bootstrap replicates", tree.bootstrap_replicates)
        } else {
            String::new()
        };
        tree_item("Tree", format!("{} leaves{}", tree.leaves, bootstrap), false);
    }
    tree_item("Elapsed", format_duration(run.elapsed), false);
    match &run.outputs.report {
        Some(report) => tree_item("Report", report.display(), true),
        None => tree_item("Output", run.output_dir.display(), true),
    }

    if !run.reports.is_empty() {
        let mut table = create_standard_table();
        table.set_header(vec![
            header_cell("Stage"),
            header_cell("State"),
            header_cell("Attempts"),
            header_cell("Waited"),
            header_cell("Elapsed"),
            header_cell("Last failure"),
        ]);
        for report in &run.reports {
            let failure = report
                .failure
                .as_ref()
                .map(|f| format!("[{}] {}", f.kind, f.cause))
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(report.stage),
                status_cell(report.succeeded(), "succeeded", &report.state.to_string()),
                Cell::new(report.attempts),
                Cell::new(format_duration(report.total_wait())),
                Cell::new(format_duration(report.elapsed)),
                Cell::new(failure),
            ]);
        }
        println!("\n{}", table);
    }

    if let (Some(err), RunStatus::Failed) = (&run.error, run.status) {
        error(&format!("{} (exit code {})", err, run.exit_code()));
    }
}
