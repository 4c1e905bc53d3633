use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use kqldrift::dsl::{ClusterState, DatabaseState, FollowerState, StateLoader};
use kqldrift::{
    diff_followers, validate_column_order, Change, ChangeSet, CommentKind, DiffContext,
    Reconcilable, Result, Settings, UpdatePolicyValidator,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kqldrift")]
#[command(author, version, about = "Kusto schema-as-code drift planner", long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true, env = "KQLDRIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Treat int/long/real/decimal as distinct types
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes needed to move from one state to another
    Plan {
        /// Current state; an empty state when omitted
        #[arg(long)]
        from: Option<PathBuf>,

        /// Desired state
        #[arg(long)]
        to: PathBuf,

        #[arg(long, value_enum, default_value_t = StateKind::Database)]
        kind: StateKind,

        /// Print the change set as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run update-policy and column-order validation on a database state
    Validate {
        #[arg(long)]
        state: PathBuf,

        /// Live or previous state used for column-order checks
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StateKind {
    Database,
    Cluster,
    Follower,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when the result should block a rollout.
fn run(cli: Cli) -> Result<bool> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.strict {
        settings.validation = settings.validation.strict();
    }
    let context = DiffContext::new(settings.validation);
    let loader = StateLoader::new();

    match cli.command {
        Commands::Plan {
            from,
            to,
            kind,
            json,
        } => match kind {
            StateKind::Database => {
                let to = loader.load_database(&to)?;
                let from = match from {
                    Some(path) => loader.load_database(&path)?,
                    None => DatabaseState::new(to.name.clone()),
                };
                let mut passed = plan(&from, &to, &context, json)?;
                for followers in diff_followers(&from, &to, &context) {
                    passed &= report(&followers, json)?;
                }
                Ok(passed)
            }
            StateKind::Cluster => {
                let to = loader.load_cluster(&to)?;
                let from = match from {
                    Some(path) => loader.load_cluster(&path)?,
                    None => ClusterState::new(to.name.clone()),
                };
                plan(&from, &to, &context, json)
            }
            StateKind::Follower => {
                let to = loader.load_follower(&to)?;
                let from = match from {
                    Some(path) => loader.load_follower(&path)?,
                    None => FollowerState::new(to.cluster.clone(), to.database.clone()),
                };
                plan(&from, &to, &context, json)
            }
        },
        Commands::Validate { state, baseline } => {
            validate(&loader, &state, baseline.as_deref(), &context)
        }
    }
}

fn plan<S: Reconcilable>(from: &S, to: &S, context: &DiffContext, json: bool) -> Result<bool> {
    report(&S::diff(from, to, context), json)
}

fn report<S>(changes: &ChangeSet<S>, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(changes)?);
    } else {
        print_changeset(changes);
    }
    Ok(!changes.fails_rollout())
}

fn print_changeset<S>(changes: &ChangeSet<S>) {
    if changes.is_empty() {
        println!("{} {}", "No changes for".green(), changes.name.bold());
        return;
    }

    println!("{} {}", "Changes for".bold(), changes.name.cyan().bold());
    for change in &changes.changes {
        if let Change::Heading(heading) = change {
            println!("\n{}", format!("## {}", heading.text).bold().underline());
            continue;
        }

        println!("\n  {} {}", change.entity_type().dimmed(), change.entity().bold());
        if let Some(comment) = change.comment() {
            let label = format!("[{}]", comment.kind);
            let label = match comment.kind {
                CommentKind::Caution => label.red().bold(),
                CommentKind::Warning => label.yellow().bold(),
                _ => label.blue(),
            };
            for line in comment.text.lines() {
                println!("    {} {}", label, line);
            }
        }
        for script in change.scripts() {
            let text = match script.is_valid {
                Some(false) => format!("{} (invalid)", script.text).red(),
                _ if script.is_informational() => script.text.dimmed(),
                _ => script.text.green(),
            };
            println!("    {}", text);
        }
    }

    let executable = changes.executable_scripts().len();
    println!("\n{} executable script(s)", executable.to_string().bold());
    if changes.fails_rollout() {
        println!("{}", "Rollout blocked by CAUTION findings".red().bold());
    }
}

fn validate(
    loader: &StateLoader,
    state: &Path,
    baseline: Option<&Path>,
    context: &DiffContext,
) -> Result<bool> {
    let state = loader.load_database(state)?;
    let baseline = baseline.map(|p| loader.load_database(p)).transpose()?;
    let validator = UpdatePolicyValidator::new(&context.extractor);

    let mut passed = true;
    for (name, table) in &state.tables {
        if context.validation.update_policies {
            let result =
                validator.validate_table(name, table, &state.tables, &context.validation);
            for error in &result.errors {
                passed = false;
                println!("{} {}: {}", "[CAUTION]".red().bold(), name.bold(), error);
            }
            for warning in &result.warnings {
                println!("{} {}: {}", "[WARNING]".yellow().bold(), name.bold(), warning);
            }
        }

        if context.validation.column_order {
            let old_columns = baseline
                .as_ref()
                .and_then(|b| b.tables.get(name))
                .map(|t| &t.columns);
            let result = validate_column_order(old_columns, &table.columns, name);
            if let Some(comment) = result.to_comment() {
                passed &= !comment.fails_rollout;
                println!("{} {}", format!("[{}]", comment.kind).red().bold(), comment.text);
            }
        }
    }

    if passed {
        println!("{} {}", "Validation passed for".green(), state.name.bold());
    }
    Ok(passed)
}
