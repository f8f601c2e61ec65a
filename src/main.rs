#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use turbo::bot::{self, BotContext};
use turbo::checks::run_startup_checks;
use turbo::config::{self, Config};
use turbo::http::HttpClient;
use turbo::store;
use turbo::transport::{create_transport, TransportKind};
use turbo::{updater, ConfigCommands};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `Turbo` - a command bot for Discord.
#[derive(Parser, Debug)]
#[command(name = "turbo")]
#[command(author = "jaydenkieran")]
#[command(version)]
#[command(about = "A command bot for Discord.", long_about = None)]
struct Cli {
    /// Directory holding turbo.toml (default: $TURBO_CONFIG_DIR, then ./config)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to Discord and answer commands until shut down
    #[command(long_about = "\
Connect to Discord and answer commands until shut down.

Runs the startup checks, opens the tag store, logs in with the configured \
token and dispatches every message that starts with the prefix. Stops on \
Ctrl-C or the `shutdown` command.

Examples:
  turbo run
  turbo --config-dir ~/.turbo run
  RUST_LOG=debug turbo run")]
    Run,

    /// Answer commands typed on stdin, printing responses to stdout
    #[command(long_about = "\
Answer commands typed on stdin.

Uses the same pipeline as `run`, but each line read from stdin is a message \
written by the local operator, who is also the acting account. No token is \
needed.

Examples:
  turbo console
  echo '!ping' | turbo console")]
    Console,

    /// Run the startup checks and config validation, then exit
    Check,

    /// List the registered commands and their aliases
    Commands,

    /// Pull the latest version with git
    #[command(long_about = "\
Pull the latest version with git.

Runs `git pull` in the current directory. Changes take effect the next time \
the bot starts.")]
    Update,

    /// Manage configuration
    #[command(long_about = "\
Manage Turbo configuration.

Examples:
  turbo config schema > turbo.schema.json
  turbo config path")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `turbo`.

Examples:
  source <(turbo completions bash)
  turbo completions zsh > ~/.zfunc/_turbo")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
    }
    let config_dir = config::resolve_config_dir(cli.config_dir.as_deref().map(Path::new));

    // Stdout-only commands; no logging so nothing corrupts the output.
    match &cli.command {
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            return write_shell_completion(*shell, &mut stdout);
        }
        Commands::Config { config_command } => {
            return handle_config_command(config_command, &config_dir);
        }
        _ => {}
    }

    if let Commands::Update = cli.command {
        init_logging(None)?;
        let cwd = std::env::current_dir().context("Cannot determine working directory")?;
        if let Err(e) = updater::self_update(&cwd) {
            eprintln!("ERROR: {e:#}");
            std::process::exit(1);
        }
        return Ok(());
    }

    let require_token = matches!(cli.command, Commands::Run);
    let report = run_startup_checks(&config_dir, require_token).await;
    eprint!("{}", report.render());
    let passed = report.is_ok();
    let config = match report.config {
        Some(config) if passed => config,
        _ => std::process::exit(1),
    };

    match cli.command {
        Commands::Check => {
            println!("Config OK: {}", config.config_path.display());
            Ok(())
        }
        Commands::Commands => {
            print_commands(&config);
            Ok(())
        }
        Commands::Run => {
            init_logging(log_file(&config).as_deref())?;
            start_bot(config, TransportKind::Discord).await
        }
        Commands::Console => {
            // stdout belongs to the conversation; logs only go to the file.
            init_logging_file_only(log_file(&config).as_deref())?;
            let mut config = config;
            // The operator types as the acting account.
            config.bot_account = false;
            start_bot(config, TransportKind::Console).await
        }
        Commands::Update | Commands::Config { .. } | Commands::Completions { .. } => {
            unreachable!()
        }
    }
}

async fn start_bot(config: Config, kind: TransportKind) -> Result<()> {
    let http = HttpClient::new(&config.http);
    let transport = create_transport(kind, &config, http.inner())?;
    let self_user = transport
        .current_user()
        .await
        .context("Failed to log in")?;
    info!(
        user = %self_user.display_tag(),
        transport = transport.name(),
        bot_account = config.bot_account,
        "Logged in"
    );

    let tag_store = store::create_tag_store(&config);
    let backup_tags = store::load_backup_tags(&config);
    let bot = BotContext::new(config, transport, self_user, bot::default_handlers)
        .with_store(tag_store)
        .with_backup_tags(backup_tags)
        .with_http(http);

    bot::run(Arc::new(bot)).await?;
    info!("Shut down");
    Ok(())
}

fn handle_config_command(command: &ConfigCommands, config_dir: &Path) -> Result<()> {
    match command {
        ConfigCommands::Schema => {
            let schema = schemars::schema_for!(Config);
            println!(
                "{}",
                serde_json::to_string_pretty(&schema).context("failed to serialize JSON Schema")?
            );
        }
        ConfigCommands::Path => {
            println!("Config dir:  {}", config_dir.display());
            println!(
                "Config file: {}",
                config_dir.join(config::CONFIG_FILE_NAME).display()
            );
        }
    }
    Ok(())
}

fn print_commands(config: &Config) {
    let (snapshot, summary) = bot::build_snapshot(config, bot::default_handlers);
    println!(
        "{} commands, {} aliases (prefix {:?})\n",
        summary.commands, summary.aliases, config.prefix
    );
    for name in snapshot.registry.names() {
        let summary_line = snapshot
            .registry
            .get(name)
            .map(|descriptor| descriptor.spec.render_doc(&config.prefix))
            .and_then(|doc| doc.lines().next().map(str::to_string))
            .unwrap_or_default();
        let aliases: Vec<&str> = snapshot
            .aliases
            .as_ref()
            .map(|table| table.aliases_of(name).collect())
            .unwrap_or_default();
        let aliases = if aliases.is_empty() {
            String::new()
        } else {
            format!("  (aliases: {})", aliases.join(", "))
        };
        println!("  {name:<12} {summary_line}{aliases}");
    }
}

fn log_file(config: &Config) -> Option<PathBuf> {
    config
        .logging
        .file
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(|f| config.resolve_path(f))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Open the log file, truncating whatever the previous run left.
fn open_log_file(path: &Path) -> Result<std::sync::Mutex<std::fs::File>> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(std::sync::Mutex::new(file))
}

/// Console output respecting `RUST_LOG` (default `info`), plus a plain-text copy in `log_file`.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|writer| fmt::layer().with_ansi(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("setting default subscriber failed")
}

fn init_logging_file_only(log_file: Option<&Path>) -> Result<()> {
    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|writer| fmt::layer().with_ansi(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .context("setting default subscriber failed")
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
