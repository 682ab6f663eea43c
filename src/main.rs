use anyhow::{bail, Result};
use sql_lineage::{
    cli::{Cli, Commands},
    config::Settings,
    export::{export_all, export_script},
    logging::init_tracing,
    process::{process_directory, process_file, BatchReport, ScriptSelection},
    ui::{LogUi, UiApp},
    writer::LineageStore,
};
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let tui = matches!(cli.command, Commands::Process { tui: true, .. });
    if !tui {
        init_tracing();
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.store.db_path = db;
    }

    match cli.command {
        Commands::Process {
            input_dir,
            mode,
            include,
            exclude,
            policy,
            column_check,
            max_path_length,
            export_dir,
            lineage_json,
            no_export,
            tui,
        } => {
            if let Some(policy) = policy {
                settings.processing.failure_policy = policy;
            }
            if let Some(check) = column_check {
                settings.processing.column_check = check;
            }
            if let Some(max) = max_path_length {
                settings.lineage.max_path_length = max;
            }
            if let Some(dir) = export_dir {
                settings.output.export_dir = dir;
            }
            if let Some(path) = lineage_json {
                settings.output.lineage_json = path;
            }
            if no_export {
                settings.output.export_json = false;
            }
            settings.validate()?;

            let start = Instant::now();
            let mode = mode.unwrap_or_default();
            let selection = ScriptSelection { include, exclude };

            let report = if tui {
                let mut app = UiApp::new()?;
                let result = process_directory(&input_dir, &settings, mode, selection, &mut app);
                match &result {
                    Ok(report) => app.finish(&summary_line(report, start))?,
                    Err(_) => app.restore()?,
                }
                result?
            } else {
                process_directory(&input_dir, &settings, mode, selection, &mut LogUi::new())?
            };

            println!("{}", summary_line(&report, start));
            for failure in &report.failures {
                eprintln!("  {}: {}", failure.script, failure.error);
            }
            if !report.is_success() {
                bail!("{} script(s) failed", report.failures.len());
            }
        }

        Commands::File {
            facts,
            export_dir,
            no_export,
        } => {
            if let Some(dir) = export_dir {
                settings.output.export_dir = dir;
            }

            let mut store = LineageStore::open(&settings.store.db_path)?;
            let outcome = process_file(&mut store, &facts, &settings)?;
            if settings.output.export_json && !no_export {
                let files = export_script(&outcome, &settings.output.export_dir)?;
                println!("Wrote {:?}, {:?}, {:?}", files.detail, files.summary, files.graph);
            }
            store.finalize()?;

            println!(
                "Processed {} ({} detail edges, {} summary edges, {} cycles)",
                outcome.script_id,
                outcome.detail_stats.edges,
                outcome.summary_stats.edges,
                outcome.cycles.len()
            );
        }

        Commands::Export { output_dir } => {
            let dir = output_dir.unwrap_or(settings.output.export_dir);
            let store = LineageStore::open(&settings.store.db_path)?;
            let export = export_all(&store, &dir)?;
            println!(
                "Exported {} detail edges and {} summary edges to {:?}",
                export.detail_edges, export.summary_edges, dir
            );
        }

        Commands::Reset => {
            let mut store = LineageStore::open(&settings.store.db_path)?;
            store.reset()?;
            store.finalize()?;
            println!("Reset {:?}", settings.store.db_path);
        }

        Commands::Stats => {
            let store = LineageStore::open(&settings.store.db_path)?;
            let counts = store.counts()?;
            println!("Store: {:?}\n", settings.store.db_path);
            println!("  scripts              {}", counts.scripts);
            println!("  statements           {}", counts.statements);
            println!("  tables               {}", counts.tables);
            println!("  columns              {}", counts.columns);
            println!("  script lineage       {}", counts.script_lineage);
            println!("  detail edges         {}", counts.detail_edges);
            println!("  summary edges        {}", counts.summary_edges);
        }
    }

    Ok(())
}

fn summary_line(report: &BatchReport, start: Instant) -> String {
    format!(
        "Processed {}/{} scripts ({} skipped, {} failed{}) in {:.1}s",
        report.processed.len(),
        report.total,
        report.skipped.len(),
        report.failures.len(),
        if report.aborted { ", stopped early" } else { "" },
        start.elapsed().as_secs_f64()
    )
}
