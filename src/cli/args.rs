use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI entrypoint for `pysymindex`.
#[derive(Parser, Debug)]
#[command(
    name = "pysymindex",
    about = "Project-scoped symbol indexer and dependency resolver",
    author = "pysymindex developers",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or refresh the symbol index for a project.
    Index(IndexArgs),
    /// Query a class and its resolved dependency closure.
    QueryClass(QueryClassArgs),
    /// Query a function or method and its resolved dependency closure.
    QueryFunction(QueryFunctionArgs),
    /// List known classes and functions in the project (or one file).
    ListSymbols(ListSymbolsArgs),
    /// Run a long-lived HTTP+JSON daemon.
    Serve(ServeArgs),
}

/// Arguments shared by every subcommand that operates on a project.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory (defaults to the current directory).
    #[arg(short = 'p', long = "project", default_value = ".")]
    pub project_root: PathBuf,

    /// Directory used to store the project's on-disk symbol cache.
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,

    /// Optional server URL for delegating this operation to a daemon.
    ///
    /// When set (either via this flag or the `PYSYMINDEX_SERVER_URL`
    /// environment variable), the CLI sends the request to the HTTP
    /// server instead of running locally. Use `--no-server` to force
    /// local execution.
    #[arg(long = "server", env = "PYSYMINDEX_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local execution.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Force a full rebuild even if the project is already indexed.
    #[arg(long = "force")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct QueryClassArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Class name to look up.
    pub name: String,

    /// Prefer matches whose file path contains this substring.
    #[arg(long = "file-hint")]
    pub file_hint: Option<String>,
}

#[derive(Args, Debug)]
pub struct QueryFunctionArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Function or method name to look up.
    pub name: String,

    /// Prefer matches whose file path contains this substring.
    #[arg(long = "file-hint")]
    pub file_hint: Option<String>,

    /// Restrict to a method of this exact class name.
    #[arg(long = "host-class")]
    pub host_class: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListSymbolsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Restrict the listing to a single file.
    #[arg(long = "file")]
    pub file_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to, e.g. "127.0.0.1:7879".
    #[arg(long = "addr", default_value = "127.0.0.1:7879")]
    pub addr: String,

    /// Project root the server will index and answer queries for.
    #[arg(short = 'p', long = "project", default_value = ".")]
    pub project_root: PathBuf,

    /// Directory used to store the project's on-disk symbol cache.
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
}
