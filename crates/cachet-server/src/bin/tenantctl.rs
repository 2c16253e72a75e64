//! Operator tool for tenant provisioning.
//!
//! Works directly on the data directory, no running server required.
//! Creating a tenant registers it as pending; the tenant owner completes
//! activation through the setup flow in their browser.

use clap::{Parser, Subcommand};

use cachet_shared::crypto::hash_id;
use cachet_store::Store;

#[derive(Parser)]
#[command(name = "tenantctl", about = "Tenant provisioning for a Cachet instance")]
struct Cli {
    /// Root of the on-disk store.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the data directory layout.
    Init,
    /// Register a tenant in the pending state.
    Create {
        /// Plaintext tenant name; only its hash is stored.
        name: String,
    },
    /// Delete a tenant with all its entrypoints and conversations.
    Delete { name: String },
    /// List active and pending tenant hashes.
    List,
    /// Record the instance owner's public key (hex).
    SetOwner { pk: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = Store::open(cli.data_dir).await?;

    match cli.command {
        Command::Init => {
            println!("Data directory initialized");
        }
        Command::Create { name } => {
            let hash = hash_id(&name);
            store.create_pending_tenant(&hash).await?;
            println!("Created pending tenant '{name}' as {hash}");
        }
        Command::Delete { name } => {
            let hash = hash_id(&name);
            store.delete_tenant(&hash).await?;
            println!("Deleted tenant '{name}' ({hash})");
        }
        Command::List => {
            let active = store.active_tenants().await?;
            println!("Active tenants ({}):", active.len());
            for tenant in &active {
                println!("  {tenant}");
            }

            let mut pending = Vec::new();
            for tenant in store.all_tenants().await? {
                if store.tenant_pending(&tenant).await? {
                    pending.push(tenant);
                }
            }
            println!("Pending tenants ({}):", pending.len());
            for tenant in &pending {
                println!("  {tenant}");
            }
        }
        Command::SetOwner { pk } => {
            store.set_instance_owner(&pk).await?;
            println!("Instance owner key recorded");
        }
    }

    Ok(())
}
