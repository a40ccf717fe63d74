//! Console Entry Point
//!
//! Small command-line driver around the auth orchestrator: sign in, register,
//! inspect the current session, and sign out, with state persisted between
//! invocations. Uses `anyhow` for startup errors; auth-level failures surface
//! through `auth::AuthError`.

use std::env;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::application::machine::RegisterInput;
use auth::{
    AuthOrchestrator, AuthState, FileSnapshotStore, GatewayConfig, HttpIdentityGateway,
    HttpProfileStore, OrchestratorConfig,
};
use platform::storage::JsonStore;

/// Environment variable overriding where client state is kept
const ENV_STATE_DIR: &str = "AUTH_STATE_DIR";
const DEFAULT_STATE_DIR: &str = ".auth-state";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console=info,auth=info,platform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing backend settings are fatal before any command runs
    let config = GatewayConfig::from_env().context("identity backend configuration")?;
    tracing::info!(backend = %config.base_url, "Identity backend configured");

    let state_dir = env::var(ENV_STATE_DIR).unwrap_or_else(|_| DEFAULT_STATE_DIR.to_string());
    let storage = JsonStore::new(&state_dir, "auth");

    let gateway = Arc::new(HttpIdentityGateway::new(config.clone(), storage.clone())?);
    let profiles = Arc::new(HttpProfileStore::new(config, Arc::clone(&gateway))?);
    let snapshots = Arc::new(FileSnapshotStore::new(storage));

    let orch = AuthOrchestrator::new(
        gateway,
        profiles,
        snapshots,
        OrchestratorConfig::default(),
    );
    tracing::info!(state_dir = %state_dir, "Auth orchestrator ready");

    // Pre-render from the advisory snapshot while the real check runs
    if let Some(hint) = orch.cached_hint().await {
        println!("(cached) last signed in as {}", hint.display_name());
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    match command {
        "status" => {
            match orch.bootstrap().await? {
                AuthState::SignedIn(session) => {
                    println!("Signed in as {} <{}>", session.display_name(), session.identity.email);
                    println!("  role: {}", session.profile.role.code());
                    println!("  admin: {}", session.is_admin());
                    if !session.permissions.is_empty() {
                        println!("  permissions:");
                        for grant in session.permissions.grants() {
                            println!("    - {grant}");
                        }
                    }
                }
                _ => println!("Not signed in"),
            }
        }
        "signin" => {
            let [email, password] = two_args(&args, "signin EMAIL PASSWORD")?;
            orch.bootstrap().await?;
            let session = orch.sign_in(email, password).await?;
            println!("Signed in as {}", session.display_name());
        }
        "register" => {
            let [email, password] = two_args(&args, "register EMAIL PASSWORD")?;
            orch.register(RegisterInput {
                email: email.to_string(),
                password: password.to_string(),
                ..Default::default()
            })
            .await?;
            println!("Account created for {email}; sign in to continue");
        }
        "refresh" => {
            orch.bootstrap().await?;
            let session = orch.refresh().await?;
            println!(
                "Session refreshed: {} permission(s)",
                session.permissions.len()
            );
        }
        "signout" => {
            orch.bootstrap().await?;
            orch.sign_out().await?;
            println!("Signed out");
        }
        other => {
            bail!("Unknown command '{other}'. Commands: status, signin, register, refresh, signout");
        }
    }

    Ok(())
}

fn two_args<'a>(args: &'a [String], usage: &str) -> anyhow::Result<[&'a str; 2]> {
    match args {
        [_, first, second] => Ok([first, second]),
        _ => bail!("Usage: console {usage}"),
    }
}
