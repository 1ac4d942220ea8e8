//! Carbon Bytes terminal client.
//!
//! Wires the store, identity and a line-fed code source into a session
//! controller. Each stdin line is either an intent (`:scan`, `:cancel`,
//! `:disconnect`, `:quit`) or the text of a decoded machine code.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{EnvFilter, fmt};

use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_core::events::SessionEvent;
use carbonbytes_core::traits::SharedIdentity;
use carbonbytes_core::types::UserId;
use carbonbytes_entity::user::NewUser;
use carbonbytes_service::UserService;
use carbonbytes_session::{CodeFeeder, ManualCodeSource, SessionController, SessionDeps, SessionSettings, SessionView};
use carbonbytes_store::StoreManager;

/// How long to wait for the final release write on exit.
const RELEASE_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from the config directory and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let dir = std::env::var("CARBONBYTES_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("CARBONBYTES_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&dir, &env)
}

/// Initialize tracing/logging. Logs go to stderr; stdout carries the view.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Main client run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Carbon Bytes v{}", env!("CARGO_PKG_VERSION"));

    // ── Store ────────────────────────────────────────────────
    tracing::info!("Opening document store (provider: {})", config.store.provider);
    let store = StoreManager::new(&config.store)?.store();

    // ── Identity ─────────────────────────────────────────────
    let identity = match std::env::var("CARBONBYTES_USER") {
        Ok(raw) => {
            let user = UserId::parse(&raw)?;
            let profile = UserService::new(Arc::clone(&store))
                .sign_in(&NewUser {
                    id: user.clone(),
                    display_name: std::env::var("CARBONBYTES_DISPLAY_NAME").ok(),
                    email: std::env::var("CARBONBYTES_EMAIL").ok(),
                    photo_url: None,
                })
                .await?;
            println!("Signed in as {} ({} points)", profile.display_name(), profile.points);
            SharedIdentity::signed_in(user)
        }
        Err(_) => {
            println!("Not signed in; set CARBONBYTES_USER to claim machines");
            SharedIdentity::anonymous()
        }
    };

    // ── Session controller ───────────────────────────────────
    let (code_source, feeder) = ManualCodeSource::new();
    let controller = SessionController::spawn(
        SessionDeps {
            store,
            identity: Arc::new(identity),
            code_source: Arc::new(code_source),
        },
        SessionSettings::from_config(&config.session, &config.scanner),
    );

    let renderer = tokio::spawn(render(controller.watch()));
    let mut events = controller.events();

    print_help();
    read_commands(&controller, &feeder).await;

    // ── Shutdown ─────────────────────────────────────────────
    let held = controller.view().is_connected();
    controller.unmount().await;
    if held {
        wait_for_release(&mut events).await;
    }
    renderer.abort();
    tracing::info!("Carbon Bytes client stopped");
    Ok(())
}

/// Feed stdin lines to the controller until `:quit`, EOF or Ctrl+C.
async fn read_commands(controller: &SessionController, feeder: &CodeFeeder) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        let sent = match line.trim() {
            "" => Ok(()),
            ":quit" | ":q" => break,
            ":help" => {
                print_help();
                Ok(())
            }
            ":scan" => controller.start_scan(),
            ":cancel" => controller.cancel_scan(),
            ":disconnect" => controller.disconnect(),
            code => {
                if !feeder.decode(code) {
                    println!("Not scanning; type :scan first");
                }
                Ok(())
            }
        };
        if let Err(e) = sent {
            tracing::error!("Session controller stopped: {}", e);
            break;
        }
    }
}

/// Print the session view whenever it changes.
async fn render(mut view: watch::Receiver<SessionView>) {
    let mut last = String::new();
    loop {
        let line = view.borrow_and_update().status_line();
        if line != last {
            println!("{line}");
            last = line;
        }
        if view.changed().await.is_err() {
            break;
        }
    }
}

/// Wait briefly for the release triggered by unmount to land.
async fn wait_for_release(events: &mut broadcast::Receiver<SessionEvent>) {
    let released = async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Released { outcome, .. }) => break Some(outcome),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break None,
            }
        }
    };
    match tokio::time::timeout(RELEASE_GRACE, released).await {
        Ok(Some(outcome)) => tracing::info!(?outcome, "Machine released on exit"),
        Ok(None) | Err(_) => tracing::warn!("Exited before the machine release was confirmed"),
    }
}

fn print_help() {
    println!("Commands: :scan  :cancel  :disconnect  :quit");
    println!("While scanning, type a machine code and press Enter.");
}
