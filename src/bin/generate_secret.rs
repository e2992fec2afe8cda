use std::process::ExitCode;
use tracing::error;

use decompas_admin_bootstrap::{generate_secret, logging};

fn main() -> ExitCode {
    logging::init("warn");

    println!("🔐 Generating INIT_ADMIN_SECRET...\n");

    let secret = match generate_secret() {
        Ok(secret) => secret,
        Err(e) => {
            error!("❌ {:#}", anyhow::Error::new(e));
            return ExitCode::FAILURE;
        }
    };

    println!("Secret (hex, 32 bytes):");
    println!("{}", secret);
    println!("\nAdd this to your deployment environment as:");
    println!("INIT_ADMIN_SECRET={}", secret);

    println!("\n⚠️  SECURITY WARNING:");
    println!("- Store this secret securely and never commit it");
    println!("- Anyone holding it can call the admin initialization endpoint");
    println!("- Use a different secret for each environment");

    ExitCode::SUCCESS
}
