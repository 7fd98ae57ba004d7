// src/main.rs

mod aggregate;
mod cli;
mod identity;
mod ingest;
mod model;
mod period;
mod profile;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::Args;
use identity::IdentityResolver;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let start_time = Instant::now();

    if let Err(e) = run(&args) {
        eprintln!("Error extracting statistics: {e:#}");
        std::process::exit(1);
    }

    println!("Total time: {:.2?}", start_time.elapsed());
}

fn run(args: &Args) -> Result<()> {
    let resolver = match &args.username_map {
        Some(path) => {
            let resolver = IdentityResolver::from_file(path)?;
            log::info!(
                "Loaded {} username mappings from {}",
                resolver.len(),
                path.display()
            );
            resolver
        }
        None => IdentityResolver::empty(),
    };

    let ingest_start = Instant::now();
    let corpus = ingest::read_backup(&args.backup, &resolver)?;
    println!(
        "Ingestion finished in {:.2?}. Found {} PRs ({} merged), {} merge actions, {} comments.",
        ingest_start.elapsed(),
        corpus.opened_prs.len(),
        corpus.merged_prs.len(),
        corpus.merge_actions.len(),
        corpus.comments.len()
    );

    // Global facts must be complete before the per-period folds that
    // project them.
    let aggregate_start = Instant::now();
    let facts = aggregate::GlobalFacts::compute(&corpus);
    let bundles = aggregate::aggregate_all(&corpus, &facts);
    println!("Aggregation finished in {:.2?}.", aggregate_start.elapsed());

    for (tf, bundle) in &bundles {
        log::info!("  {}: {} periods", tf.name(), bundle.periods.len());
    }
    log::info!("Total merged PRs: {}", corpus.merged_prs.len());
    log::info!("Total unique PR authors: {}", facts.first_merge.len());
    log::info!("Comment threshold: >{}", aggregate::COMMENT_THRESHOLD);

    let profiles = args.profiles.then(|| corpus.profiles.clone());
    let report = report::assemble(aggregate::COMMENT_THRESHOLD, bundles, profiles);
    let size = report::write(&report, &args.output)?;
    println!(
        "Wrote {} ({:.1} MB)",
        args.output.display(),
        size as f64 / 1024.0 / 1024.0
    );

    Ok(())
}
