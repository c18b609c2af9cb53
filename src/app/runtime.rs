//! One archive run from parsed arguments to printed summary.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use bibarchive_core::{
    Acquirer, ArchivePipeline, CancelToken, DirectoryStore, NullStore, Output, SourcePathTemplate,
    SourceStore, ZoteroClient, render_bibtex, rewrite_entry_urls,
};
use tracing::{debug, info, warn};

use crate::app::{config_manager, input_processor, progress_manager, terminal};
use crate::cli::Args;

pub(crate) async fn run_archive(args: Args) -> Result<()> {
    let config = config_manager::resolve_config(&args)?;
    info!("Bibarchive starting");

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let mut naming =
        SourcePathTemplate::from_config(&config.naming).context("Invalid naming pattern")?;
    let acquirer = Acquirer::from_config(config)?;
    let zotero = ZoteroClient::new(acquirer.client().clone());
    let pipeline = ArchivePipeline::new(acquirer, cancel);

    let (stream, total) = if args.zotero {
        (pipeline.spawn_zotero_pipeline(zotero, args.source.as_str()), None)
    } else {
        let entries = input_processor::read_bibtex_source(&args.source)?;
        let total = entries.len();
        (pipeline.spawn_bibtex_pipeline(entries), Some(total))
    };

    let mut store: Box<dyn SourceStore> = if args.dry_run {
        info!("Dry run - nothing will be written");
        Box::new(NullStore::new())
    } else {
        debug!(dir = %args.out_dir.display(), "Archiving into directory");
        Box::new(DirectoryStore::new(&args.out_dir))
    };

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let processed = Arc::new(AtomicUsize::new(0));
    let (progress_handle, progress_stop) =
        progress_manager::spawn_progress_ui(use_spinner, Arc::clone(&processed), total);

    let result = pipeline
        .store_results(stream, store.as_mut(), &mut naming, |_| {
            processed.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    let report = result?;

    let output = Output::from_report(&report);
    let mut stdout = io::stdout().lock();
    if args.json {
        writeln!(stdout, "{}", output.to_json()?)?;
    } else {
        output.pretty_print(&mut stdout)?;
    }

    if let Some(path) = &args.output {
        let entries = rewrite_entry_urls(&report)?;
        std::fs::write(path, render_bibtex(&entries))
            .with_context(|| format!("Failed to write BibTeX output '{}'", path.display()))?;
        info!(path = %path.display(), entries = entries.len(), "Wrote rewritten bibliography");
    }

    Ok(())
}
