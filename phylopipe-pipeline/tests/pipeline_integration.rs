/// End-to-end runs of the pipeline against simulated tools
use phylopipe_core::config::resolve;
use phylopipe_core::{
    ErrorKind, MoleculeType, OverrideMap, PhyloError, PipelineConfig, PresetDocument, RunStatus,
    SearchSource, StageKind,
};
use phylopipe_pipeline::{
    BatchRunner, CancelSignal, OutcomeLabel, Pipeline, PipelineBuilder, StageState,
    ALIGNMENT_FILE, BATCH_REPORT_FILE, RUN_REPORT_FILE, SEARCH_HITS_FILE, TREE_FILE,
};
use phylopipe_test::{
    hemoglobin_hits, hemoglobin_library, hemoglobin_query, init_test_logging, self_hits,
    two_sequence_query, FixedResources, MockRemoteSearch, MockSequenceSource, RecordingReporter,
    ScriptedRunner, StaticProbe, TestEnvironment,
};
use phylopipe_tools::Registries;
use phylopipe_utils::ProgressEvent;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn builder(
    env: &TestEnvironment,
    runner: &Arc<ScriptedRunner>,
    reporter: &Arc<RecordingReporter>,
) -> PipelineBuilder {
    init_test_logging();
    Pipeline::builder()
        .registries(Registries::with_probe(Arc::new(StaticProbe::all())))
        .runner(runner.clone())
        .reporter(reporter.clone())
        .resources(Arc::new(FixedResources::default()))
        .catalog(env.catalog())
        .workspace(env.workspace_config())
}

fn local_env() -> TestEnvironment {
    let env = TestEnvironment::new().unwrap();
    env.add_blast_database("swissprot", MoleculeType::Protein)
        .unwrap();
    env
}

fn report_json(output: &std::path::Path) -> serde_json::Value {
    let text = fs::read_to_string(output.join(RUN_REPORT_FILE)).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_local_run_produces_all_outputs() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("hba");

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &output)
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(runner.call_count("blastp"), 1);
    assert_eq!(runner.call_count("blastdbcmd"), 1);
    assert_eq!(runner.call_count("mafft"), 1);
    assert_eq!(runner.call_count("FastTree"), 1);

    let search = run.search.as_ref().unwrap();
    assert_eq!(search.source, SearchSource::Local);
    assert_eq!(search.database, "swissprot");
    assert_eq!(search.hits, 4);
    assert_eq!(run.alignment.as_ref().unwrap().records, 5);
    assert_eq!(run.tree.as_ref().unwrap().leaves, 5);

    for file in [SEARCH_HITS_FILE, ALIGNMENT_FILE, TREE_FILE, RUN_REPORT_FILE] {
        assert!(output.join(file).is_file(), "missing {}", file);
    }

    // best e-value first, ties broken by identity
    let hits = fs::read_to_string(output.join(SEARCH_HITS_FILE)).unwrap();
    let first = hits.lines().find(|l| !l.starts_with('#')).unwrap();
    assert!(first.contains("HBA_HORSE"), "{}", first);

    let tree = fs::read_to_string(output.join(TREE_FILE)).unwrap();
    assert!(tree.trim_end().ends_with(';'));
    assert!(tree.contains("query_HBA"));
    assert!(tree.contains("sp_P01942.2_HBA_MOUSE"));

    assert_eq!(env.leftover_workspaces(), 0);
    assert!(run.cleanup.is_clean());
    assert!(run.reports.iter().all(|r| r.attempts == 1 && r.succeeded()));
}

#[tokio::test(start_paused = true)]
async fn test_quick_preset_on_two_sequences() {
    let env = local_env();
    let sequences = two_sequence_query();
    let query = env.write_query("pair.fasta", &sequences).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        self_hits(&sequences),
        Vec::new(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("pair");

    let config = resolve(
        &PresetDocument::builtin(),
        "quick",
        &OverrideMap::new(),
        pipeline.registries(),
    )
    .unwrap();
    let run = pipeline.run(&config, &query, &output).await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    assert_eq!(run.alignment.as_ref().unwrap().records, 2);
    assert_eq!(run.tree.as_ref().unwrap().leaves, 2);
    assert_eq!(runner.call_count("muscle"), 1);
    assert_eq!(runner.call_count("blastdbcmd"), 0);

    let alignment = phylopipe_bio::parse_fasta(output.join(ALIGNMENT_FILE)).unwrap();
    let ids: Vec<&str> = alignment.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["seqA", "seqB"]);
    assert_eq!(alignment[0].len(), alignment[1].len());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_method_fails_before_any_tool_runs() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("hba");

    let config = PipelineConfig {
        alignment_method: "clustalw".to_string(),
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&config, &query, &output).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.exit_code(), 2);
    assert_eq!(runner.total_calls(), 0);
    assert!(run.reports.is_empty());
    assert!(run.error.as_ref().unwrap().to_string().contains("clustalw"));
    assert_eq!(env.leftover_workspaces(), 0);

    let report = report_json(&output);
    assert_eq!(report["status"], "failed");
    assert_eq!(report["exit_code"], 2);
    assert_eq!(report["error"]["kind"], "configuration");
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_on_fasttree_is_rejected_up_front() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();

    let mut overrides = OverrideMap::new();
    overrides.insert("tree_method".to_string(), "fasttree".into());
    overrides.insert("tree_model".to_string(), "JTT".into());
    let err = resolve(
        &PresetDocument::builtin(),
        "publication",
        &overrides,
        pipeline.registries(),
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);

    let config = PipelineConfig {
        bootstrap_replicates: 1000,
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&config, &query, &env.output_dir("hba")).await;
    assert_eq!(run.exit_code(), 2);
    assert_eq!(runner.total_calls(), 0);
    assert!(reporter.events().iter().all(|e| !matches!(e, ProgressEvent::StageStarted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_transient_search_failures_then_success() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library())
            .fail_transiently("blastp", 2),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    let search = run.stage_report(StageKind::Search).unwrap();
    assert_eq!(search.attempts, 3);
    assert_eq!(search.outcome, OutcomeLabel::Success);
    assert!(search.total_wait() >= Duration::from_secs(6));
    assert!(search.failure.is_none());
    assert_eq!(runner.call_count("blastp"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_resources_exit_three() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter)
        .resources(Arc::new(FixedResources::new(2, 64 * 1024 * 1024 * 1024)))
        .build();

    let config = PipelineConfig {
        tree_threads: 4,
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&config, &query, &env.output_dir("hba")).await;

    assert_eq!(run.exit_code(), 3);
    assert_eq!(runner.total_calls(), 0);
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_alignment_failures_are_retried_with_backoff() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library())
            .fail_transiently("mafft", 2),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("hba");

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &output)
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    let alignment = run.stage_report(StageKind::Alignment).unwrap();
    assert_eq!(alignment.attempts, 3);
    assert_eq!(
        alignment.waits,
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(
        alignment.transitions,
        vec![
            StageState::Pending,
            StageState::Running,
            StageState::RetryPending,
            StageState::Running,
            StageState::RetryPending,
            StageState::Running,
            StageState::Succeeded,
        ]
    );
    assert_eq!(runner.call_count("mafft"), 3);
    assert_eq!(reporter.starts(StageKind::Alignment), 3);
    assert_eq!(
        reporter.waits(StageKind::Alignment),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(run.elapsed >= Duration::from_secs(6));
    assert_eq!(env.leftover_workspaces(), 0);

    let report = report_json(&output);
    assert_eq!(report["stages"][1]["attempts"], 3);
    assert_eq!(report["stages"][1]["waits_ms"][1], 4000);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_tree_stage_keeps_earlier_outputs() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library())
            .fail_transiently("FastTree", 4),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("hba");

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &output)
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.exit_code(), 4);
    assert_eq!(runner.call_count("FastTree"), 4);
    match run.error.as_ref().unwrap() {
        PhyloError::Stage {
            stage,
            kind,
            attempts,
            exhausted,
            ..
        } => {
            assert_eq!(*stage, StageKind::Tree);
            assert_eq!(*kind, ErrorKind::TransientExecution);
            assert_eq!(*attempts, 4);
            assert!(*exhausted);
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert!(output.join(SEARCH_HITS_FILE).is_file());
    assert!(output.join(ALIGNMENT_FILE).is_file());
    assert!(!output.join(TREE_FILE).exists());
    assert_eq!(env.leftover_workspaces(), 0);

    let report = report_json(&output);
    assert_eq!(report["status"], "failed");
    assert_eq!(report["exit_code"], 4);
    assert_eq!(report["stages"][2]["state"], "failed");
}

#[tokio::test(start_paused = true)]
async fn test_fatal_tool_failure_is_not_retried() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library()).fail_next(
            "mafft",
            PhyloError::ToolFailed {
                tool: "mafft".to_string(),
                status: "exit status 1".to_string(),
                stderr: "unknown option".to_string(),
            },
        ),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert_eq!(run.exit_code(), 5);
    assert_eq!(runner.call_count("mafft"), 1);
    assert_eq!(runner.call_count("FastTree"), 0);
    let alignment = run.stage_report(StageKind::Alignment).unwrap();
    assert_eq!(alignment.outcome, OutcomeLabel::FatalFailure);
    assert!(alignment.waits.is_empty());
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_local_database_falls_back_to_remote() {
    let env = TestEnvironment::new().unwrap();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(Vec::new(), Vec::new()));
    let reporter = Arc::new(RecordingReporter::new());
    let remote = Arc::new(MockRemoteSearch::new(hemoglobin_hits()));
    let fetcher = Arc::new(MockSequenceSource::new(hemoglobin_library()));
    let pipeline = builder(&env, &runner, &reporter)
        .remote(remote.clone())
        .remote_fetcher(fetcher.clone())
        .build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    assert_eq!(run.search.as_ref().unwrap().source, SearchSource::Remote);
    assert_eq!(runner.call_count("blastp"), 0);
    assert_eq!(runner.call_count("blastdbcmd"), 0);
    assert_eq!(
        remote.requests(),
        vec![("blastp".to_string(), "swissprot".to_string())]
    );
    assert_eq!(fetcher.requested().len(), 4);
    assert_eq!(run.alignment.as_ref().unwrap().records, 5);
}

#[tokio::test(start_paused = true)]
async fn test_missing_local_tool_falls_back_to_remote() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(Vec::new(), Vec::new()));
    let reporter = Arc::new(RecordingReporter::new());
    let remote = Arc::new(MockRemoteSearch::new(hemoglobin_hits()));
    let pipeline = builder(&env, &runner, &reporter)
        .registries(Registries::with_probe(Arc::new(StaticProbe::all_except(&[
            "blastp",
        ]))))
        .remote(remote.clone())
        .remote_fetcher(Arc::new(MockSequenceSource::new(hemoglobin_library())))
        .build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    assert_eq!(run.search.as_ref().unwrap().source, SearchSource::Remote);
    assert_eq!(remote.call_count(), 1);
    assert_eq!(runner.call_count("blastp"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_local_database_without_remote_is_a_configuration_error() {
    let env = TestEnvironment::new().unwrap();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let remote = Arc::new(MockRemoteSearch::new(hemoglobin_hits()));
    let pipeline = builder(&env, &runner, &reporter)
        .remote(remote.clone())
        .build();

    let config = PipelineConfig {
        allow_remote: false,
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&config, &query, &env.output_dir("hba")).await;

    assert_eq!(run.exit_code(), 2);
    assert_eq!(runner.total_calls(), 0);
    assert_eq!(remote.call_count(), 0);
    assert_eq!(run.stage_report(StageKind::Search).unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_remote_failures_are_retried() {
    let env = TestEnvironment::new().unwrap();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(Vec::new(), Vec::new()));
    let reporter = Arc::new(RecordingReporter::new());
    let remote = Arc::new(MockRemoteSearch::new(hemoglobin_hits()).fail_transiently(1));
    let pipeline = builder(&env, &runner, &reporter)
        .remote(remote.clone())
        .remote_fetcher(Arc::new(MockSequenceSource::new(hemoglobin_library())))
        .build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    assert_eq!(remote.call_count(), 2);
    assert_eq!(run.stage_report(StageKind::Search).unwrap().attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_search_without_hits_leaves_nothing_to_align() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(Vec::new(), Vec::new()));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("lenient"))
        .await;
    assert_eq!(run.exit_code(), 5);
    assert!(run.stage_report(StageKind::Search).unwrap().succeeded());
    assert_eq!(
        run.stage_report(StageKind::Alignment).unwrap().failure.as_ref().unwrap().kind,
        ErrorKind::EmptyResult
    );
    assert_eq!(runner.call_count("mafft"), 0);

    let strict = PipelineConfig {
        zero_hits_fatal: true,
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&strict, &query, &env.output_dir("strict")).await;
    assert_eq!(run.exit_code(), 5);
    assert!(run.stage_report(StageKind::Alignment).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_query_is_fatal() {
    let env = local_env();
    let query = env.write_file("empty.fasta", "").unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("empty"))
        .await;

    assert_eq!(run.exit_code(), 5);
    assert_eq!(runner.total_calls(), 0);
    assert!(run
        .error
        .as_ref()
        .unwrap()
        .to_string()
        .contains("malformed query"));
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_supports_reach_the_report() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("raxml");

    let config = PipelineConfig {
        tree_method: "raxml".to_string(),
        tree_model: "PROTGAMMAJTT".to_string(),
        bootstrap_replicates: 100,
        ..PipelineConfig::default()
    };
    let run = pipeline.run(&config, &query, &output).await;

    assert_eq!(run.status, RunStatus::Succeeded, "{:?}", run.error);
    let tree = run.tree.as_ref().unwrap();
    assert_eq!(tree.leaves, 5);
    assert_eq!(tree.bootstrap_replicates, 100);
    assert!(!tree.supports.is_empty());
    assert!(tree.supports.iter().all(|s| *s == Some(100.0)));
    assert_eq!(runner.call_count("raxmlHPC-PTHREADS"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_cleans_up() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library())
            .fail_transiently("mafft", 3),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let cancel = CancelSignal::new();
    let pipeline = builder(&env, &runner, &reporter)
        .cancel_signal(cancel.clone())
        .build();
    let output = env.output_dir("hba");

    let config = PipelineConfig::default();
    let (run, ()) = tokio::join!(pipeline.run(&config, &query, &output), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.trigger();
    });

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.exit_code(), 130);
    assert!(run.stage_report(StageKind::Search).unwrap().succeeded());
    let alignment = run.stage_report(StageKind::Alignment).unwrap();
    assert_eq!(alignment.state, StageState::Cancelled);
    assert_eq!(alignment.attempts, 1);
    assert_eq!(runner.call_count("FastTree"), 0);
    assert!(output.join(SEARCH_HITS_FILE).is_file());
    assert_eq!(env.leftover_workspaces(), 0);
    assert_eq!(report_json(&output)["status"], "cancelled");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_tool_run() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::simulated(hemoglobin_hits(), hemoglobin_library())
            .delay("FastTree", Duration::from_secs(600)),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let cancel = CancelSignal::new();
    let pipeline = builder(&env, &runner, &reporter)
        .cancel_signal(cancel.clone())
        .build();
    let output = env.output_dir("hba");

    let config = PipelineConfig::default();
    let (run, ()) = tokio::join!(pipeline.run(&config, &query, &output), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.trigger();
    });

    assert_eq!(run.exit_code(), 130);
    assert_eq!(
        run.stage_report(StageKind::Tree).unwrap().state,
        StageState::Cancelled
    );
    assert!(run.elapsed < Duration::from_secs(600));
    assert!(output.join(ALIGNMENT_FILE).is_file());
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retained_workspace_survives_the_run() {
    let env = local_env();
    let query = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter)
        .workspace(env.workspace_config().retain(true))
        .build();

    let run = pipeline
        .run(&PipelineConfig::default(), &query, &env.output_dir("hba"))
        .await;

    assert!(run.succeeded());
    assert!(run.cleanup.retained);
    assert_eq!(env.leftover_workspaces(), 1);
    assert!(run.cleanup.workspace.join("workspace.json").is_file());
}

#[tokio::test(start_paused = true)]
async fn test_batch_runs_every_query_and_reports_first_failure() {
    let env = local_env();
    let good = env.write_query("hba.fasta", &hemoglobin_query()).unwrap();
    let bad = env.write_file("broken.fasta", "").unwrap();
    let pair = env.write_query("pair.fasta", &two_sequence_query()).unwrap();
    let runner = Arc::new(ScriptedRunner::simulated(
        hemoglobin_hits(),
        hemoglobin_library(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = builder(&env, &runner, &reporter).build();
    let output = env.output_dir("batch");

    let queries = vec![good, bad, pair];
    let outcome = BatchRunner::new(&pipeline, 2)
        .run(&PipelineConfig::default(), &queries, &output)
        .await;

    assert_eq!(outcome.runs.len(), 3);
    let statuses: Vec<RunStatus> = outcome.runs.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Succeeded, RunStatus::Failed, RunStatus::Succeeded]
    );
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.exit_code(), 5);

    for name in ["hba", "broken", "pair"] {
        assert!(output.join(name).join(RUN_REPORT_FILE).is_file(), "{}", name);
    }

    let path = outcome.write_report(&output).unwrap();
    assert_eq!(path, output.join(BATCH_REPORT_FILE));
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(report["total"], 3);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["runs"][1]["status"], "failed");
    assert_eq!(env.leftover_workspaces(), 0);
}
