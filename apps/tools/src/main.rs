use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use panel_core::files::{is_safe_file_name, TempLinkSigner, DEV_FILE_SECRET};
use shared::{
    domain::{DomainDraft, DomainId, DomainState},
    model::Draft,
};
use storage::{Repository, Storage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/panel.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateDomain {
        name: String,
        #[arg(long)]
        note: Option<String>,
    },
    SetState {
        domain_id: i64,
        state: DomainState,
    },
    /// Prints the query string for a signed temp-view link.
    TempLink {
        temp_file: String,
        #[arg(long, default_value = DEV_FILE_SECRET)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::CreateDomain { name, note } => {
            let mut draft = DomainDraft::default();
            draft.assign("name", &name).map_err(anyhow::Error::msg)?;
            draft.note = note;
            draft.validate()?;
            let storage = Storage::new(&cli.database_url).await?;
            let domain = storage.domains().insert(&draft).await?;
            info!(id = domain.id.0, name = %domain.name, "domain created");
            println!("created domain_id={}", domain.id.0);
        }
        Command::SetState { domain_id, state } => {
            let storage = Storage::new(&cli.database_url).await?;
            if !storage.domains().set_state(DomainId(domain_id), state).await? {
                bail!("domain {domain_id} does not exist");
            }
            println!("domain_id={domain_id} state={state}");
        }
        Command::TempLink { temp_file, secret } => {
            if !is_safe_file_name(&temp_file) {
                bail!("\"{temp_file}\" is not a plain file name");
            }
            if secret == DEV_FILE_SECRET {
                warn!("signing with the development file secret");
            }
            let key = TempLinkSigner::new(secret.as_bytes())?.sign(&temp_file);
            println!("/file/temp-view?temp_file={temp_file}&key={key}");
        }
    }

    Ok(())
}
