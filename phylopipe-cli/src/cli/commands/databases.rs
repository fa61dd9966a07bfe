use crate::cli::options::load_settings;
use crate::cli::GlobalOptions;
use clap::Args;
use comfy_table::Cell;
use phylopipe_tools::LocalDatabaseCatalog;
use phylopipe_utils::{create_standard_table, header_cell, info, section_header};

#[derive(Args)]
pub struct DatabasesArgs {
    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: DatabasesArgs, global: &GlobalOptions) -> anyhow::Result<i32> {
    let settings = load_settings(global)?;
    let dirs = settings.database_dirs();
    let catalog = LocalDatabaseCatalog::discover(&dirs);

    if args.format == "json" {
        let databases: Vec<_> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&databases)?);
        return Ok(0);
    }

    section_header("Local databases");
    if catalog.is_empty() {
        info("No local databases found");
    } else {
        let mut table = create_standard_table();
        table.set_header(vec![
            header_cell("Name"),
            header_cell("Molecule"),
            header_cell("Format"),
            header_cell("Path"),
        ]);
        for database in catalog.iter() {
            table.add_row(vec![
                Cell::new(&database.name),
                Cell::new(database.molecule),
                Cell::new(database.format),
                Cell::new(database.path.display()),
            ]);
        }
        println!("{}", table);
    }

    info(&format!(
        "Searched: {}",
        dirs.iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    Ok(0)
}
