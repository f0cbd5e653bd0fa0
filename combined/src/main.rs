//! Operator CLI for the identity services.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use auth_service_lib::config::AuthServiceConfig;
use auth_service_lib::service::{AuthService, LoginRequest};
use auth_service_lib::token::{JwtTokenIssuer, TokenIssuer};
use domain::{Password, ROLE_CODE_ADMIN};
use user_service_lib::config::UserServiceConfig;
use user_service_lib::events::TracingEventPublisher;
use user_service_lib::service::{CreateRoleInput, CreateUserInput, RoleService, UserService};

const DEMO_SECRET: &str = "identity-ctl-demo-secret-not-for-production";

#[derive(Parser)]
#[command(name = "identity-ctl")]
#[command(about = "Operator tooling for tenant users, roles and sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a password against the policy and print its argon2 hash
    HashPassword { password: String },
    /// Load the auth configuration from the environment and print it
    CheckConfig,
    /// Validate an access or refresh token and print its claims
    InspectToken { token: String },
    /// Seed an in-memory tenant and walk through login, refresh and logout
    Demo {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, default_value = "Adm1nPassword")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    common::init_tracing("info");

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            let hash = Password::new(&password)?;
            println!("{}", hash.as_str());
        }
        Commands::CheckConfig => {
            let auth = AuthServiceConfig::from_env()?;
            let users = UserServiceConfig::from_env()?;
            let summary = serde_json::json!({
                "max_failed_attempts": auth.max_failed_attempts,
                "lock_duration_secs": auth.lock_duration_secs,
                "jwt": auth.jwt,
                "separate_refresh_secret": !auth.jwt.refresh_secret.is_empty(),
                "request_timeout_ms": auth.request_timeout.map(|t| t.as_millis() as u64),
                "redis_blacklist": auth.cache.is_some(),
                "default_page_size": users.pagination.default_page_size,
                "max_page_size": users.pagination.max_page_size,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::InspectToken { token } => {
            let config = AuthServiceConfig::from_env()?;
            let issuer = JwtTokenIssuer::new(config.jwt);
            let claims = match issuer.validate_access(&token) {
                Ok(claims) => serde_json::to_value(claims)?,
                Err(_) => serde_json::to_value(issuer.validate_refresh(&token)?)?,
            };
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Demo { username, password } => demo(&username, &password).await?,
    }

    Ok(())
}

async fn demo(username: &str, password: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = match AuthServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Auth configuration unavailable, using demo defaults");
            AuthServiceConfig::with_secret(DEMO_SECRET)
        }
    };

    let events = Arc::new(TracingEventPublisher);
    let services = user_service_lib::in_memory(UserServiceConfig::default(), events.clone());
    let auth = auth_service_lib::build_authenticator(
        config,
        services.users.clone(),
        services.roles.clone(),
        events,
    )
    .await?;

    let tenant_id = Uuid::new_v4();
    let role = services
        .role_service
        .create_role(CreateRoleInput {
            tenant_id,
            code: ROLE_CODE_ADMIN.into(),
            name: "Administrator".into(),
            is_system_role: true,
            permissions: vec!["user:read".into(), "user:create".into(), "role:read".into()],
            ..Default::default()
        })
        .await?;
    let user = services
        .user_service
        .create_user(CreateUserInput {
            tenant_id,
            username: username.into(),
            password: password.into(),
            role_ids: vec![role.id()],
            active: true,
            ..Default::default()
        })
        .await?;
    info!(%tenant_id, user_id = %user.id(), role_id = %role.id(), "Seeded demo tenant");

    let login = auth
        .login(LoginRequest {
            tenant_id,
            username: username.into(),
            password: password.into(),
            client_ip: "127.0.0.1".into(),
        })
        .await?;
    println!("login:\n{}", serde_json::to_string_pretty(&login)?);

    let rotated = auth.refresh_token(&login.tokens.refresh_token).await?;
    println!("refresh:\n{}", serde_json::to_string_pretty(&rotated)?);

    match auth.refresh_token(&login.tokens.refresh_token).await {
        Ok(_) => println!("reuse: accepted"),
        Err(e) => println!("reuse: rejected ({})", e.code()),
    }

    auth.logout(user.id(), Some(rotated.access_jti.clone())).await?;
    match auth.validate_access_token(&rotated.access_token).await {
        Ok(_) => println!("after logout: access token still valid"),
        Err(e) => println!("after logout: access token rejected ({})", e.code()),
    }

    Ok(())
}
