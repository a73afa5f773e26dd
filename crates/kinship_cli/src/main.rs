//! Command-line entry point.
//!
//! # Responsibility
//! - Import an archive into a storage directory.
//! - Report dangling references and walk ancestry over stored data.
//! - Keep output line-oriented and deterministic for scripting.

use kinship_core::service::name_groups::display_name;
use kinship_core::{
    core_version, import_into, init_logging, EntityGraph, EntityType, KinshipConfig, Storage,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage:
  kinship import <archive> [storage_dir]
  kinship check [storage_dir]
  kinship ancestors <person_id> [storage_dir]
  kinship version";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("kinship: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let config = KinshipConfig::from_env()?;
    init_logging(&config)?;

    let command = args.first().map(String::as_str);
    info!(
        "event=cli_command module=cli status=start command={}",
        command.unwrap_or("none")
    );
    match command {
        Some("import") => {
            let archive = args.get(1).ok_or_else(|| USAGE.to_string())?;
            let config = config.with_storage_dir(args.get(2));
            import_command(PathBuf::from(archive), config)
        }
        Some("check") => check_command(config.with_storage_dir(args.get(1))),
        Some("ancestors") => {
            let person_id = args.get(1).ok_or_else(|| USAGE.to_string())?;
            ancestors_command(person_id, config.with_storage_dir(args.get(2)))
        }
        Some("version") => {
            println!("kinship_core version={}", core_version());
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn import_command(archive: PathBuf, config: KinshipConfig) -> Result<(), String> {
    let mut storage = Storage::open(config.storage_dir);
    let summary = import_into(&mut storage, &archive).map_err(|err| err.to_string())?;
    for (entity_type, count) in &summary.counts {
        println!("{entity_type}={count}");
    }
    println!("total={} written={}", summary.total(), summary.written);
    Ok(())
}

fn check_command(config: KinshipConfig) -> Result<(), String> {
    let storage = Storage::open(config.storage_dir);
    let graph = EntityGraph::new(&storage).map_err(|err| err.to_string())?;
    let dangling = graph
        .dangling_references()
        .map_err(|err| err.to_string())?;
    for reference in &dangling {
        println!(
            "{}/{} {} -> {}/{}",
            reference.source_type,
            reference.source_id,
            reference.field,
            reference.target_type,
            reference.target
        );
    }
    println!("dangling={}", dangling.len());
    Ok(())
}

fn ancestors_command(person_id: &str, config: KinshipConfig) -> Result<(), String> {
    let storage = Storage::open(config.storage_dir);
    let graph = EntityGraph::new(&storage).map_err(|err| err.to_string())?;
    let person = graph
        .get(EntityType::Person, person_id)
        .map_err(|err| err.to_string())?;
    for ancestor in graph.ancestors(person).map_err(|err| err.to_string())? {
        println!("{} {}", ancestor.id(), display_name(ancestor));
    }
    Ok(())
}
