use anyhow::{Context, Result};
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info, warn};

use decompas_admin_bootstrap::{
    auth::FirebaseAuthClient,
    config::Config,
    db::FirestoreClient,
    google_api::build_http_client,
    logging,
    models::{AdminAccountRequest, ProvisionedAdmin},
    provisioning::{provision_admin, ProvisionOptions},
    security::credentials::{AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource},
};

/// Remote collaborators, built once per process and dropped at exit
struct Clients {
    identity: FirebaseAuthClient,
    store: FirestoreClient,
    project_id: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("❌ Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Admin provisioning aborted: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;
    info!("Configuration loaded successfully");

    if !config.admin_password_from_env {
        warn!("⚠️  ADMIN_PASSWORD not set, using the bootstrap default password");
    }

    let clients = build_clients(&config)?;
    info!(project = %clients.project_id, emulators = config.uses_emulators(), "🔧 Firebase clients ready");

    let request = config.admin_request();
    let options = ProvisionOptions::from(&config);

    let admin = provision_admin(&clients.identity, &clients.store, &request, &options).await?;
    print_summary(&admin, &request);

    Ok(())
}

fn build_clients(config: &Config) -> Result<Clients> {
    let http = build_http_client(config.request_timeout()).context("Failed to build HTTP client")?;

    let (tokens, key_project): (Arc<dyn AccessTokenSource>, Option<String>) = if config.uses_emulators() {
        (Arc::new(StaticTokenSource::emulator()) as Arc<dyn AccessTokenSource>, None)
    } else {
        let path = config
            .credentials_path
            .as_deref()
            .context("GOOGLE_APPLICATION_CREDENTIALS not set")?;
        let key = ServiceAccountKey::from_file(path).context("Failed to load service account key")?;
        let source = ServiceAccountTokenSource::new(http.clone(), key)
            .context("Failed to initialize service account credentials")?;
        let project = source.project_id().to_string();
        (Arc::new(source) as Arc<dyn AccessTokenSource>, Some(project))
    };

    let project_id = config
        .project_id
        .clone()
        .or(key_project)
        .context("FIREBASE_PROJECT_ID not set and not present in the service account key")?;

    let mut identity = FirebaseAuthClient::new(http.clone(), project_id.clone(), tokens.clone());
    if let Some(host) = &config.auth_emulator_host {
        identity = identity.with_emulator(host);
    }

    let mut store = FirestoreClient::new(http, project_id.clone(), tokens);
    if let Some(host) = &config.firestore_emulator_host {
        store = store.with_emulator(host);
    }

    Ok(Clients {
        identity,
        store,
        project_id,
    })
}

fn print_summary(admin: &ProvisionedAdmin, request: &AdminAccountRequest) {
    println!("\n🎉 Admin user is ready");
    println!("📧 Email:    {}", request.email);
    if admin.reused_identity {
        println!("🔑 Password: (unchanged, existing account)");
    } else {
        println!("🔑 Password: {}", request.password);
    }
    println!("🆔 UID:      {}", admin.identity.uid);
    println!("📄 Profile:  {}", admin.document_path);
    println!("\n⚠️  IMPORTANT:");
    println!("- Change this password after the first login");
    println!("- Do not share these credentials");
}
