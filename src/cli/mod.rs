use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;

use crate::config::AppConfig;
use crate::indexer::ProjectIndexer;
use crate::resolver::DependencyResolver;

mod args;
mod config;
mod http_backend;

pub use args::{
    Cli, Commands, IndexArgs, ListSymbolsArgs, ProjectArgs, QueryClassArgs, QueryFunctionArgs,
    ServeArgs,
};

use config::{apply_project_config_defaults, apply_serve_config_defaults, load_cli_config};
use http_backend::HttpSearchBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = load_cli_config()?;

    match cli.command {
        Some(Commands::Index(mut index_args)) => {
            if let Some(ref config) = cli_config {
                apply_project_config_defaults(config, &mut index_args.project);
            }

            if let Some(server_url) = effective_server_url(&index_args.project) {
                let backend = HttpSearchBackend::new(server_url)?;
                backend.rebuild_index(index_args.force)?;
            } else {
                let mut resolver = local_resolver(&index_args.project)?;
                resolver.rebuild_index(index_args.force)?;
            }

            println!("index up to date");
            Ok(())
        }
        Some(Commands::QueryClass(mut query_args)) => {
            if let Some(ref config) = cli_config {
                apply_project_config_defaults(config, &mut query_args.project);
            }

            let result = if let Some(server_url) = effective_server_url(&query_args.project) {
                let backend = HttpSearchBackend::new(server_url)?;
                Some(backend.query_class(&query_args.name, query_args.file_hint.as_deref())?)
            } else {
                let mut resolver = local_resolver(&query_args.project)?;
                resolver.query_class(&query_args.name, query_args.file_hint.as_deref())?
            };

            print_json_or_not_found(result, &query_args.name)
        }
        Some(Commands::QueryFunction(mut query_args)) => {
            if let Some(ref config) = cli_config {
                apply_project_config_defaults(config, &mut query_args.project);
            }

            let result = if let Some(server_url) = effective_server_url(&query_args.project) {
                let backend = HttpSearchBackend::new(server_url)?;
                Some(backend.query_function(
                    &query_args.name,
                    query_args.file_hint.as_deref(),
                    query_args.host_class.as_deref(),
                )?)
            } else {
                let mut resolver = local_resolver(&query_args.project)?;
                resolver.query_function(
                    &query_args.name,
                    query_args.file_hint.as_deref(),
                    query_args.host_class.as_deref(),
                )?
            };

            print_json_or_not_found(result, &query_args.name)
        }
        Some(Commands::ListSymbols(mut list_args)) => {
            if let Some(ref config) = cli_config {
                apply_project_config_defaults(config, &mut list_args.project);
            }

            let result = if let Some(server_url) = effective_server_url(&list_args.project) {
                let backend = HttpSearchBackend::new(server_url)?;
                backend.list_symbols(list_args.file_path.as_ref())?
            } else {
                let mut resolver = local_resolver(&list_args.project)?;
                resolver.list_symbols(list_args.file_path.as_deref())?
            };

            serde_json::to_writer_pretty(std::io::stdout(), &result)?;
            println!();
            Ok(())
        }
        Some(Commands::Serve(mut serve_args)) => {
            if let Some(ref config) = cli_config {
                apply_serve_config_defaults(config, &mut serve_args);
            }

            let project_args = ProjectArgs {
                project_root: serve_args.project_root.clone(),
                cache_dir: serve_args.cache_dir.clone(),
                server: None,
                no_server: true,
            };
            let resolver = local_resolver(&project_args)?;
            let shared = Arc::new(Mutex::new(resolver));

            let addr: SocketAddr = serve_args
                .addr
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid --addr {:?}: {e}", serve_args.addr))?;

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(crate::server::run(addr, shared))
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn local_resolver(project: &ProjectArgs) -> Result<DependencyResolver> {
    let cache = AppConfig::with_cache_dir(project.cache_dir.clone())?;
    let indexer = ProjectIndexer::open(&project.project_root, &cache.cache_dir)?;
    Ok(DependencyResolver::new(indexer))
}

fn effective_server_url(project: &ProjectArgs) -> Option<String> {
    if project.no_server {
        None
    } else {
        project.server.clone()
    }
}

fn print_json_or_not_found<T: serde::Serialize>(result: Option<T>, name: &str) -> Result<()> {
    match result {
        Some(value) => {
            serde_json::to_writer_pretty(std::io::stdout(), &value)?;
            println!();
            Ok(())
        }
        None => {
            eprintln!("not found: {name}");
            std::process::exit(1);
        }
    }
}
