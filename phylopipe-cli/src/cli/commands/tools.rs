use clap::Args;
use comfy_table::Cell;
use phylopipe_core::StageKind;
use phylopipe_tools::{Backend, Registries, Registry};
use phylopipe_utils::{create_standard_table, header_cell, info, section_header, status_cell};
use serde_json::json;

#[derive(Args)]
pub struct ToolsArgs {
    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

struct ToolRow {
    stage: StageKind,
    method: &'static str,
    binary: &'static str,
    location: Option<String>,
    hint: &'static str,
}

fn rows<B: Backend + ?Sized>(registry: &Registry<B>, out: &mut Vec<ToolRow>) {
    for backend in registry.iter() {
        out.push(ToolRow {
            stage: registry.stage(),
            method: backend.name(),
            binary: backend.binary(),
            location: registry
                .locate(backend.name())
                .map(|path| path.display().to_string()),
            hint: backend.install_hint(),
        });
    }
}

pub fn run(args: ToolsArgs) -> anyhow::Result<i32> {
    let registries = Registries::standard();
    let mut tools = Vec::new();
    rows(&registries.search, &mut tools);
    rows(&registries.alignment, &mut tools);
    rows(&registries.tree, &mut tools);

    if args.format == "json" {
        let entries: Vec<_> = tools
            .iter()
            .map(|t| {
                json!({
                    "stage": t.stage,
                    "method": t.method,
                    "binary": t.binary,
                    "installed": t.location.is_some(),
                    "path": t.location,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }

    section_header("Registered methods");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Stage"),
        header_cell("Method"),
        header_cell("Executable"),
        header_cell("Installed"),
        header_cell("Location"),
    ]);
    for tool in &tools {
        table.add_row(vec![
            Cell::new(tool.stage),
            Cell::new(tool.method),
            Cell::new(tool.binary),
            status_cell(tool.location.is_some(), "yes", "no"),
            Cell::new(tool.location.as_deref().unwrap_or(tool.hint)),
        ]);
    }
    println!("{}", table);

    let missing = tools.iter().filter(|t| t.location.is_none()).count();
    if missing > 0 {
        info(&format!(
            "{} of {} tools missing; runs fall back to NCBI for search when allowed",
            missing,
            tools.len()
        ));
    }
    Ok(0)
}
