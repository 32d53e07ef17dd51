use clap::{Args, Parser, Subcommand};
use nu_plugin_scoutstats::algo::dataset::{parse_dataset, Dataset, GroupId, VillageId};
use nu_plugin_scoutstats::algo::selection::SelectionState;
use nu_plugin_scoutstats::algo::table::{ColumnFilterSpec, SortSpec, TableQuery};
use nu_plugin_scoutstats::error::{Error, Result};
use nu_plugin_scoutstats::ops::{self, SelectOp};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Env var holding the log filter, e.g. `SCOUTSTATS_LOG=debug`.
const LOG_ENV_VAR: &str = "SCOUTSTATS_LOG";

#[derive(Parser)]
#[command(
    name = "scoutstats",
    version,
    about = "Registration statistics for scout group survey data"
)]
struct Cli {
    /// Start as an MCP (Model Context Protocol) server on stdio.
    #[cfg(feature = "mcp")]
    #[arg(long, exclusive = true)]
    mcp: bool,

    /// Dataset JSON file, or `-` to read it from stdin. Defaults to
    /// $SCOUTSTATS_DATA, then $XDG_DATA_HOME/scoutstats/villages.json, then
    /// the bundled fixture.
    #[arg(short, long, global = true)]
    data: Option<String>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    /// SQLite cache database for query results.
    #[cfg(feature = "cache")]
    #[arg(long, global = true)]
    cache: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SelectionArgs {
    /// Comma-separated scout group ids, e.g. `101,102`.
    #[arg(short, long, conflicts_with = "state")]
    groups: Option<String>,
    /// Selection state JSON file; its `selectedGroupIds` are used.
    #[arg(short, long)]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List statistics categories of the selected groups
    Categories {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Total participants of the selected groups
    Participants {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Aggregate one category over the selected groups
    Aggregate {
        /// Category name (see `scoutstats categories`)
        category: String,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Per-group table of statistics leaves
    Table {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Column id to include (repeatable). Default: every column
        #[arg(short, long = "column")]
        columns: Vec<String>,
        /// Sort column, optionally `column:desc`
        #[arg(long)]
        sort: Option<String>,
        /// Filter as JSON, e.g. '{"column":"num_participants","range":{"min":20}}' (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
    /// List villages and their groups
    Villages {
        /// Case-insensitive search over village and group names
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Apply a selection operation to a state file and print the new state
    Select {
        /// State file to read; a missing file starts from an empty selection
        #[arg(short, long, global = true)]
        state: Option<PathBuf>,
        /// Write the new state back to the state file
        #[arg(short, long, global = true, requires = "state")]
        write: bool,
        #[command(subcommand)]
        op: SelectCommand,
    },
    /// Print the bundled fixture dataset
    Fixture,
    /// Show or clear the cache database
    #[cfg(feature = "cache")]
    Cache {
        /// Clear entries instead of showing info
        #[arg(short, long)]
        clear: bool,
        /// Entry kind to clear: aggregation, categories, table (default: all)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[derive(Subcommand)]
enum SelectCommand {
    /// Show the state without changing it
    Show,
    /// Select or deselect one group
    ToggleGroup { id: GroupId },
    /// Select a whole village, or deselect it when fully selected
    ToggleVillage { village: String },
    /// Deselect everything
    Clear,
    /// Select every group, optionally only in villages matching a search
    SelectAll {
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Intersect the selection with a set of groups
    Narrow {
        /// Comma-separated group ids
        ids: String,
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Narrow to the groups that gave an answer to a per-group question
    NarrowByAnswer {
        category: String,
        sub_question: String,
        answer: String,
    },
    /// Expand or collapse a village in the selector
    ToggleExpansion { village: String },
}

impl SelectCommand {
    fn to_op(&self) -> Result<Option<SelectOp>> {
        Ok(Some(match self {
            Self::Show => return Ok(None),
            Self::ToggleGroup { id } => SelectOp::ToggleGroup { id: *id },
            Self::ToggleVillage { village } => SelectOp::ToggleVillage {
                village: VillageId::parse(village),
            },
            Self::Clear => SelectOp::Clear,
            Self::SelectAll { filter } => SelectOp::SelectAll {
                filter: filter.clone(),
            },
            Self::Narrow { ids, label } => SelectOp::Narrow {
                ids: ops::parse_group_list(ids)?,
                label: label.clone(),
            },
            Self::NarrowByAnswer {
                category,
                sub_question,
                answer,
            } => SelectOp::NarrowByAnswer {
                category: category.clone(),
                sub_question: sub_question.clone(),
                answer: answer.clone(),
            },
            Self::ToggleExpansion { village } => SelectOp::ToggleExpansion {
                village: VillageId::parse(village),
            },
        }))
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // ── MCP server mode ─────────────────────────────────────────────────
    #[cfg(feature = "mcp")]
    if cli.mcp {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => fail(Error::Io(e)),
        };
        rt.block_on(async {
            if let Err(e) = nu_plugin_scoutstats::mcp::serve_stdio().await {
                eprintln!("MCP server error: {e}");
                std::process::exit(1);
            }
        });
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("No subcommand provided. Run `scoutstats --help` for usage.");
        std::process::exit(1);
    };

    #[cfg(feature = "cache")]
    let cache_path = cli.cache.as_deref();
    #[cfg(not(feature = "cache"))]
    let cache_path: Option<&str> = None;

    match run(command, cli.data.as_deref(), cache_path) {
        Ok(value) => print_json(&value),
        Err(e) => fail(e),
    }
}

fn run(command: Commands, data: Option<&str>, cache_path: Option<&str>) -> Result<Value> {
    match command {
        Commands::Fixture => ops::op_fixture(),
        #[cfg(feature = "cache")]
        Commands::Cache { clear, kind } => {
            let path = cache_path
                .ok_or_else(|| Error::invalid_argument("`cache` needs --cache <path>"))?;
            if clear {
                ops::op_cache_clear(path, kind.as_deref())
            } else {
                ops::op_cache_info(path)
            }
        }
        Commands::Categories { selection } => {
            let dataset = load_data(data)?;
            let groups = selection.resolve()?;
            Ok(ops::op_categories_cached(&dataset, groups.as_deref(), cache_path))
        }
        Commands::Participants { selection } => {
            let dataset = load_data(data)?;
            let groups = selection.resolve()?;
            Ok(ops::op_participants(&dataset, groups.as_deref()))
        }
        Commands::Aggregate {
            category,
            selection,
        } => {
            let dataset = load_data(data)?;
            let groups = selection.resolve()?;
            Ok(ops::op_aggregate_cached(
                &dataset,
                groups.as_deref(),
                &category,
                cache_path,
            ))
        }
        Commands::Table {
            selection,
            columns,
            sort,
            filters,
        } => {
            let filters = filters
                .iter()
                .map(|f| serde_json::from_str::<ColumnFilterSpec>(f))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let query = TableQuery {
                columns,
                filters,
                sort: sort.as_deref().map(SortSpec::parse),
            };
            let dataset = load_data(data)?;
            let groups = selection.resolve()?;
            Ok(ops::op_table_cached(&dataset, groups.as_deref(), &query, cache_path))
        }
        Commands::Villages { filter } => {
            let dataset = load_data(data)?;
            Ok(ops::op_villages(&dataset, filter.as_deref()))
        }
        Commands::Select { state, write, op } => {
            let dataset = load_data(data)?;
            let mut current = match &state {
                Some(path) => read_state(path)?,
                None => SelectionState::default(),
            };
            if let Some(op) = op.to_op()? {
                op.apply(&dataset, &mut current)?;
            }
            if let (true, Some(path)) = (write, &state) {
                std::fs::write(path, serde_json::to_string_pretty(&current)?)?;
                tracing::debug!(path = %path.display(), "selection state written");
            }
            Ok(ops::selection_report(&dataset, &current))
        }
    }
}

impl SelectionArgs {
    /// `None` selects every group.
    fn resolve(&self) -> Result<Option<Vec<GroupId>>> {
        if let Some(groups) = &self.groups {
            return Ok(Some(ops::parse_group_list(groups)?));
        }
        if let Some(path) = &self.state {
            let state = read_state(path)?;
            return Ok(Some(state.selected_group_ids.into_iter().collect()));
        }
        Ok(None)
    }
}

fn load_data(data: Option<&str>) -> Result<Dataset> {
    match data {
        Some("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            parse_dataset(&buf)
        }
        other => ops::resolve_dataset(other),
    }
}

/// A missing state file is an empty selection.
fn read_state(path: &Path) -> Result<SelectionState> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SelectionState::default()),
        Err(source) => Err(Error::DataSource {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e.into()),
    }
}

fn fail(e: Error) -> ! {
    tracing::debug!(error = ?e, "command failed");
    eprintln!("Error: {e}");
    std::process::exit(1);
}
