//! tds-servers CLI - Manage TOTVS application server definitions.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tds_servers::cli::{
    Cli, Commands, EnvCommands, IncludesCommands, KeyCommands, LocationCommands, RpoCommands,
};
use tds_servers::commands::{self, Output};
use tds_servers::config::{
    ConfigOverrides, OutputFormat, ResolvedSettings, UserSettings, resolve_settings, resolver,
};
use tds_servers::{Context, ManagerSettings, ServerManager};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `tds_servers=info`).
const LOG_ENV: &str = "TDS_LOG";

/// How long one watch iteration blocks before checking for interrupts.
const WATCH_POLL_MS: u64 = 500;

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let settings_file = resolver::settings_file();
    let user_settings = settings_file
        .as_ref()
        .ok()
        .map(|path| UserSettings::load(path))
        .transpose();
    let user_settings = match user_settings {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => fail(&e, cli.human_readable),
    };

    let overrides = ConfigOverrides {
        workspace_server_config: cli.workspace_server_config(),
        output_format: cli.human_readable.then_some(OutputFormat::Human),
    };
    let resolved = resolve_settings(&overrides, &user_settings, |name| env::var(name).ok());
    let human = resolved.output_format.value == OutputFormat::Human;

    let workspace = resolve_workspace(cli.workspace.clone(), human);
    let result = run_command(cli.command, workspace, settings_file.ok(), &resolved, human);

    if let Err(e) = result {
        fail(&e, human);
    }
}

/// Log to stderr, filtered by `TDS_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(e: &tds_servers::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

/// Resolve the workspace root: --workspace flag > TDS_WORKSPACE env > cwd.
fn resolve_workspace(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.is_dir() {
                let e = tds_servers::Error::NotFound(format!(
                    "workspace directory {}",
                    path.display()
                ));
                fail(&e, human);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn run_command(
    command: Commands,
    workspace: PathBuf,
    settings_file: Option<PathBuf>,
    resolved: &ResolvedSettings,
    human: bool,
) -> Result<(), tds_servers::Error> {
    if let Commands::Version = command {
        output(&commands::version(), human);
        return Ok(());
    }

    let settings = ManagerSettings {
        workspace_root: workspace,
        home_dir: resolver::home_dir()?,
        workspace_server_config: resolved.workspace_server_config.value,
        reconnect_last_server: resolved.reconnect_last_server.value,
        settings_file,
    };
    let ctx = Context::new();
    let mut manager = ServerManager::open(ctx, settings)?;

    match command {
        Commands::List => output(&commands::server_list(&manager)?, human),
        Commands::Show { server } => output(&commands::server_show(&manager, &server)?, human),
        Commands::Add(args) => {
            let result = commands::server_add(
                &mut manager,
                &args.name,
                &args.address,
                args.port,
                &args.server_type,
                args.build,
                args.secure,
                args.include,
                args.id,
            )?;
            output(&result, human);
        }
        Commands::Remove { server } => {
            output(&commands::server_remove(&mut manager, &server)?, human)
        }
        Commands::Rename { server, new_name } => output(
            &commands::server_rename(&mut manager, &server, &new_name)?,
            human,
        ),
        Commands::Set(args) => output(
            &commands::server_set(
                &mut manager,
                &args.server,
                args.patch_dir.as_deref(),
                args.smartclient.as_deref(),
            )?,
            human,
        ),
        Commands::Select { server } => {
            output(&commands::server_select(&mut manager, &server)?, human)
        }
        Commands::Deselect => output(&commands::server_deselect(&mut manager)?, human),
        Commands::Current => output(&commands::server_current(&manager)?, human),
        Commands::Env { command } => match command {
            EnvCommands::Add {
                server,
                environment,
            } => output(
                &commands::env_add(&mut manager, &server, &environment)?,
                human,
            ),
            EnvCommands::Remove {
                server,
                environment,
            } => output(
                &commands::env_remove(&mut manager, &server, &environment)?,
                human,
            ),
        },
        Commands::Includes { command } => match command {
            IncludesCommands::Show { server, absolute } => output(
                &commands::includes_show(&manager, server.as_deref(), absolute)?,
                human,
            ),
            IncludesCommands::Set { paths, server } => output(
                &commands::includes_set(&mut manager, paths, server.as_deref())?,
                human,
            ),
        },
        Commands::Key { command } => match command {
            KeyCommands::Show => output(&commands::key_show(&manager)?, human),
            KeyCommands::Set {
                token,
                expire,
                build_type,
                machine_id,
                user_id,
            } => output(
                &commands::key_set(
                    &mut manager,
                    &token,
                    &expire,
                    &build_type,
                    machine_id,
                    user_id,
                )?,
                human,
            ),
            KeyCommands::Clear => output(&commands::key_clear(&mut manager)?, human),
        },
        Commands::Rpo { command } => match command {
            RpoCommands::Set { token, file } => {
                output(&commands::rpo_set(&mut manager, &token, file)?, human)
            }
            RpoCommands::Clear => output(&commands::rpo_clear(&mut manager)?, human),
        },
        Commands::Token { server } => output(&commands::server_token(&manager, &server)?, human),
        Commands::Location { command } => match command {
            LocationCommands::Show => output(
                &commands::location_show(&manager, &resolved.workspace_server_config.source)?,
                human,
            ),
            LocationCommands::Toggle => {
                output(&commands::location_toggle(&mut manager)?, human)
            }
        },
        Commands::Ignore { paths } => output(&commands::ignore_check(&manager, &paths)?, human),
        Commands::Watch { timeout } => watch(&mut manager, timeout.map(Duration::from_secs), human)?,
        Commands::Version => output(&commands::version(), human),
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Print every change event until interrupted or `timeout` elapses.
fn watch(
    manager: &mut ServerManager,
    timeout: Option<Duration>,
    human: bool,
) -> Result<(), tds_servers::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|e| tds_servers::Error::Other(format!("failed to install Ctrl-C handler: {}", e)))?;

    manager.context().events().subscribe(move |event| {
        if human {
            println!(
                "[{:?}/{:?}] {}",
                event.group(),
                event.name(),
                event.property()
            );
        } else {
            println!("{}", serde_json::to_string(event).unwrap_or_default());
        }
    });

    manager.start_watching()?;
    if human {
        println!("Watching {} (Ctrl-C to stop)", manager.file().display());
    } else {
        println!("{}", serde_json::json!({ "watching": manager.file() }));
    }

    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        if let Err(e) = manager.wait_for_file_change(Duration::from_millis(WATCH_POLL_MS)) {
            // Keep watching: the next save may fix a broken file
            tracing::warn!(error = %e, "reload failed");
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
        }
    }

    manager.stop_watching();
    Ok(())
}
