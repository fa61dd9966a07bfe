//! Tool runner that never starts a process
//!
//! Each program name maps to a handler that fakes what the real tool would
//! leave behind. Failures can be queued per program and a delay can be added
//! to exercise timeouts and cancellation.

use async_trait::async_trait;
use parking_lot::Mutex;
use phylopipe_bio::formats::fasta::write_fasta_to_writer;
use phylopipe_bio::{parse_fasta, write_fasta, Sequence};
use phylopipe_core::{PhyloError, PhyloResult, SearchHit};
use phylopipe_tools::{accession_of, ToolCommand, ToolOutput, ToolRunner};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub type Handler = Arc<dyn Fn(&ToolCommand) -> PhyloResult<ToolOutput> + Send + Sync>;

pub const SEARCH_PROGRAMS: &[&str] = &["blastp", "blastn", "diamond"];
pub const ALIGNMENT_PROGRAMS: &[&str] = &["mafft", "muscle", "clustalo", "t_coffee"];
pub const TREE_PROGRAMS: &[&str] = &["FastTree", "raxmlHPC-PTHREADS", "iqtree2"];

#[derive(Default)]
pub struct ScriptedRunner {
    handlers: HashMap<String, Handler>,
    failures: Mutex<HashMap<String, VecDeque<PhyloError>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    /// A runner that knows no programs; every call is `ToolUnavailable`
    pub fn new() -> Self {
        Self::default()
    }

    /// Every supported tool, searches reporting `hits` and `blastdbcmd`
    /// serving entries out of `library`
    pub fn simulated(hits: Vec<SearchHit>, library: Vec<Sequence>) -> Self {
        let mut runner = Self::new();
        let search = simulated_search(hits);
        for program in SEARCH_PROGRAMS {
            runner = runner.on(program, Arc::clone(&search));
        }
        runner = runner.on("blastdbcmd", simulated_blastdbcmd(library));
        for program in ALIGNMENT_PROGRAMS {
            runner = runner.on(program, simulated_aligner());
        }
        for program in TREE_PROGRAMS {
            runner = runner.on(program, simulated_tree_builder());
        }
        runner
    }

    pub fn on(mut self, program: &str, handler: Handler) -> Self {
        self.handlers.insert(program.to_string(), handler);
        self
    }

    /// The next call of `program` fails with `error`; queued failures are
    /// consumed in order before the handler runs again
    pub fn fail_next(mut self, program: &str, error: PhyloError) -> Self {
        self.failures
            .get_mut()
            .entry(program.to_string())
            .or_default()
            .push_back(error);
        self
    }

    /// Queue `times` transient failures for `program`
    pub fn fail_transiently(mut self, program: &str, times: usize) -> Self {
        for attempt in 1..=times {
            self = self.fail_next(
                program,
                PhyloError::transient(format!("{} attempt {}: connection reset", program, attempt)),
            );
        }
        self
    }

    /// Every call of `program` waits `delay` before answering
    pub fn delay(mut self, program: &str, delay: Duration) -> Self {
        self.delays.insert(program.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> PhyloResult<ToolOutput> {
        self.calls.lock().push(command.clone());

        if let Some(delay) = self.delays.get(&command.program) {
            tokio::time::sleep(*delay).await;
        }

        let queued = self
            .failures
            .lock()
            .get_mut(&command.program)
            .and_then(VecDeque::pop_front);
        if let Some(error) = queued {
            return Err(error);
        }

        match self.handlers.get(&command.program) {
            Some(handler) => handler(command),
            None => Err(PhyloError::ToolUnavailable {
                tool: command.program.clone(),
                hint: "not scripted".to_string(),
            }),
        }
    }
}

/// Writes `hits` as 10-column tabular output into the `-out` file
pub fn simulated_search(hits: Vec<SearchHit>) -> Handler {
    Arc::new(move |cmd: &ToolCommand| {
        let out = cmd
            .outputs
            .first()
            .ok_or_else(|| PhyloError::parse("search command declares no output"))?;
        let mut text = String::new();
        for h in &hits {
            let _ = writeln!(
                text,
                "{}\t{}\t{:.2}\t{}\t{:e}\t{:.1}\t{}\t{}\t{}\t{}",
                h.query_id,
                h.target_id,
                h.identity,
                h.alignment_length,
                h.evalue,
                h.score,
                h.query_start,
                h.query_end,
                h.target_start,
                h.target_end
            );
        }
        std::fs::write(out, text)?;
        Ok(ToolOutput::default())
    })
}

/// Prints the requested `-entry` accessions found in `library` as FASTA
pub fn simulated_blastdbcmd(library: Vec<Sequence>) -> Handler {
    Arc::new(move |cmd: &ToolCommand| {
        let entries = cmd.arg_value("-entry").unwrap_or_default();
        let wanted: Vec<&str> = entries.split(',').collect();
        let found: Vec<Sequence> = library
            .iter()
            .filter(|s| wanted.contains(&accession_of(&s.id)) || wanted.contains(&s.id.as_str()))
            .cloned()
            .collect();

        let mut stdout = Vec::new();
        write_fasta_to_writer(&mut stdout, &found)?;
        Ok(ToolOutput {
            stdout,
            ..Default::default()
        })
    })
}

/// Pads every input record with gaps to the longest length
pub fn simulated_aligner() -> Handler {
    Arc::new(|cmd: &ToolCommand| {
        let input = fasta_argument(cmd)
            .ok_or_else(|| PhyloError::parse("aligner command names no FASTA input"))?;
        let output = cmd
            .stdout_path
            .clone()
            .or_else(|| cmd.outputs.first().cloned())
            .ok_or_else(|| PhyloError::parse("aligner command declares no output"))?;

        let sequences = parse_fasta(&input)?;
        let width = sequences.iter().map(Sequence::len).max().unwrap_or(0);
        let aligned: Vec<Sequence> = sequences
            .into_iter()
            .map(|mut s| {
                s.sequence.resize(width, b'-');
                s
            })
            .collect();
        write_fasta(&output, &aligned)?;
        Ok(ToolOutput::default())
    })
}

/// Writes a caterpillar tree over the alignment ids where the real tool
/// would, with support 100 on internal branches when bootstrapping
pub fn simulated_tree_builder() -> Handler {
    Arc::new(|cmd: &ToolCommand| {
        let input = fasta_argument(cmd)
            .ok_or_else(|| PhyloError::parse("tree command names no alignment"))?;
        let ids: Vec<String> = parse_fasta(&input)?.into_iter().map(|s| s.id).collect();

        let (tree_file, bootstrap) = match cmd.program.as_str() {
            "raxmlHPC-PTHREADS" => {
                let dir = PathBuf::from(cmd.arg_value("-w").unwrap_or_default());
                let name = cmd.arg_value("-n").unwrap_or_default();
                if cmd.has_arg("-f") {
                    (dir.join(format!("RAxML_bipartitions.{}", name)), true)
                } else {
                    (dir.join(format!("RAxML_bestTree.{}", name)), false)
                }
            }
            "iqtree2" => {
                let prefix = cmd.arg_value("-pre").unwrap_or_default();
                (
                    PathBuf::from(format!("{}.treefile", prefix)),
                    cmd.has_arg("-B") || cmd.has_arg("-b"),
                )
            }
            _ => {
                let out = cmd
                    .outputs
                    .first()
                    .cloned()
                    .ok_or_else(|| PhyloError::parse("tree command declares no output"))?;
                (out, false)
            }
        };

        let support = bootstrap.then_some("100");
        std::fs::write(&tree_file, format!("{};\n", caterpillar(&ids, support)))?;
        Ok(ToolOutput::default())
    })
}

fn fasta_argument(cmd: &ToolCommand) -> Option<PathBuf> {
    cmd.arg_strings()
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.extension().is_some_and(|e| e == "fasta") && p.is_file())
}

fn caterpillar(ids: &[String], support: Option<&str>) -> String {
    fn inner(ids: &[String], support: Option<&str>, root: bool) -> String {
        let label = if root { "" } else { support.unwrap_or("") };
        match ids {
            [] => String::new(),
            [only] => format!("{}:0.1", only),
            [a, b] => format!("({}:0.1,{}:0.1){}", a, b, label),
            [first, rest @ ..] => format!(
                "({}:0.1,{}:0.05){}",
                first,
                inner(rest, support, false),
                label
            ),
        }
    }
    inner(ids, support, true)
}
