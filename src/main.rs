//! usersearch: command-line front end
//!
//! Usage:
//!   usersearch search <query>   - List matching users
//!   usersearch avatars <query>  - List users and fetch their avatars
//!   usersearch help             - Show help

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usersearch::commands::Command;
use usersearch::{AssetCache, AssetSlot, Avatar, Config, HttpClient, QueryController, QueryState};

fn main() -> ExitCode {
    // Initialize logging (use try_init to avoid panic if already initialized)
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = Command::parse(&args);

    match &command {
        Command::Help => {
            println!("{}", Command::help_text());
            return ExitCode::SUCCESS;
        }
        Command::Unknown { name } => {
            eprintln!("Unknown command: {}", name);
            eprintln!("Run 'usersearch help' for usage");
            return ExitCode::FAILURE;
        }
        _ => {}
    }

    let config_path = env::var_os("USERSEARCH_CONFIG").map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: Config) -> Result<(), String> {
    let (query, with_avatars) = match command {
        Command::Search { query } => (query, false),
        Command::Avatars { query } => (query, true),
        Command::Help | Command::Unknown { .. } => return Ok(()),
    };

    if query.is_empty() {
        println!("Please enter a name to search.");
        return Ok(());
    }

    let client = Arc::new(HttpClient::new(&config).map_err(|e| e.to_string())?);
    let controller = QueryController::new(client.clone());

    controller.search(query);
    let state = controller.settled().await;
    if let Some(err) = &state.last_error {
        return Err(format!("Search failed: {}", err));
    }
    if state.results.is_empty() {
        println!("No users found for {:?}", state.query);
        return Ok(());
    }

    if with_avatars {
        let cache = AssetCache::with_limit(client, config.max_concurrent_fetches);
        let dispatched = cache.request_all(&state.results);
        tracing::info!("Fetching {} avatars", dispatched);
        cache.drain().await;
        print_avatars(&state, &cache);
    } else {
        for user in &state.results {
            println!("{:>10}  {:<24} {}", user.id, user.login, user.avatar_url);
        }
    }

    Ok(())
}

fn print_avatars(state: &QueryState, cache: &AssetCache) {
    let slots = cache.snapshot();
    for user in &state.results {
        let status = match slots.get(&user.id).cloned().unwrap_or_default() {
            AssetSlot::Loaded(avatar) => describe_avatar(&avatar),
            AssetSlot::Failed(err) if err.is_retryable() => format!("failed: {} (retryable)", err),
            AssetSlot::Failed(err) => format!("failed: {}", err),
            AssetSlot::Pending => "pending".to_string(),
            AssetSlot::Absent => "not requested".to_string(),
        };
        println!("{:<24} {}", user.login, status);
    }
}

fn describe_avatar(avatar: &Avatar) -> String {
    let format = avatar
        .format()
        .map(|f| format!("{:?}", f).to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}x{} {} {:?}, {} bytes",
        avatar.width(),
        avatar.height(),
        format,
        avatar.image().color(),
        avatar.bytes().len()
    )
}
