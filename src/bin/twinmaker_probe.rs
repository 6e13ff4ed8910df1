//! TwinMaker probe CLI
//!
//! Runs one catalog operation or a credential issuance against a real
//! account and prints the result as JSON. Settings come from `TWINMAKER_*`
//! variables (a `.env` file is honoured).
//!
//! Usage:
//!   cargo run --features cli --bin twinmaker-probe -- list-entities -w CookieFactory
//!   cargo run --features cli --bin twinmaker-probe -- \
//!     history -w CookieFactory -e Mixer_1 -c AlarmComponent -p alarm_status --hours 24
//!   cargo run --features cli --bin twinmaker-probe -- session-token -w CookieFactory

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

use twinmaker_access::query::{OrderBy, PropertyFilterQuery};
use twinmaker_access::{DataSourceSettings, RequestContext, TwinMakerApi, TwinMakerClient, TwinMakerQuery};

/// Probe the TwinMaker access layer
#[derive(Parser, Debug)]
#[command(name = "twinmaker-probe")]
#[command(about = "Run a single TwinMaker catalog query or credential issuance")]
struct Args {
    /// Region override (default: TWINMAKER_REGION, then AWS_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Abort the operation after this many seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Workspace id
    #[arg(long, short = 'w', env = "TWINMAKER_WORKSPACE_ID", default_value = "")]
    workspace: String,

    #[arg(long, short = 'e', default_value = "")]
    entity: String,

    #[arg(long, short = 'c', default_value = "")]
    component: String,

    #[arg(long, short = 't', default_value = "")]
    component_type: String,

    /// Property names (can be specified multiple times)
    #[arg(long, short = 'p')]
    property: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListWorkspaces,
    ListScenes(Target),
    ListEntities(Target),
    ListComponentTypes(Target),
    GetWorkspace(Target),
    GetEntity(Target),
    GetComponentType(Target),
    PropertyValue(Target),
    /// Property value history for the last N hours
    History {
        #[command(flatten)]
        target: Target,

        #[arg(long, default_value_t = 1)]
        hours: i64,

        #[arg(long)]
        descending: bool,

        /// Filter in the form name=value
        #[arg(long, value_parser = parse_filter)]
        filter: Vec<PropertyFilterQuery>,
    },
    /// Issue dashboard credentials
    SessionToken {
        #[arg(long, short = 'w', env = "TWINMAKER_WORKSPACE_ID", default_value = "")]
        workspace: String,

        #[arg(long, default_value_t = 900)]
        duration_secs: u64,
    },
}

fn parse_filter(s: &str) -> std::result::Result<PropertyFilterQuery, String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid name=value filter: {}", s))?;
    Ok(PropertyFilterQuery::new(&s[..pos], "", &s[pos + 1..]))
}

impl Target {
    fn query(&self) -> TwinMakerQuery {
        TwinMakerQuery::for_workspace(self.workspace.as_str())
            .with_entity(self.entity.as_str())
            .with_component_name(self.component.as_str())
            .with_component_type(self.component_type.as_str())
            .with_properties(self.property.iter().cloned())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render result")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let mut settings = DataSourceSettings::from_env();
    if let Some(region) = args.region {
        settings.region = Some(region);
    }
    let client = TwinMakerClient::new(settings).context("Failed to create TwinMaker client")?;

    let (ctx, cancel) = RequestContext::cancellable();
    let ctx = ctx.with_timeout(Duration::from_secs(args.timeout_secs));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match args.command {
        Command::ListWorkspaces => {
            print_json(&client.list_workspaces(&ctx, &TwinMakerQuery::default()).await?)?
        }
        Command::ListScenes(target) => print_json(&client.list_scenes(&ctx, &target.query()).await?)?,
        Command::ListEntities(target) => {
            print_json(&client.list_entities(&ctx, &target.query()).await?)?
        }
        Command::ListComponentTypes(target) => {
            print_json(&client.list_component_types(&ctx, &target.query()).await?)?
        }
        Command::GetWorkspace(target) => {
            print_json(&client.get_workspace(&ctx, &target.query()).await?)?
        }
        Command::GetEntity(target) => print_json(&client.get_entity(&ctx, &target.query()).await?)?,
        Command::GetComponentType(target) => {
            print_json(&client.get_component_type(&ctx, &target.query()).await?)?
        }
        Command::PropertyValue(target) => {
            print_json(&client.get_property_value(&ctx, &target.query()).await?)?
        }
        Command::History {
            target,
            hours,
            descending,
            filter,
        } => {
            let to = Utc::now();
            let mut query = target
                .query()
                .with_time_range(to - chrono::Duration::hours(hours), to);
            if descending {
                query = query.with_order(OrderBy::Descending);
            }
            for f in filter {
                query = query.with_filter(f);
            }
            print_json(&client.get_property_value_history(&ctx, &query).await?)?
        }
        Command::SessionToken {
            workspace,
            duration_secs,
        } => {
            let credentials = client
                .get_session_token(&ctx, Duration::from_secs(duration_secs), &workspace)
                .await?;
            // Only the non-secret parts are printed
            print_json(&serde_json::json!({
                "AccessKeyId": credentials.access_key_id,
                "Expiration": credentials.expiration,
            }))?
        }
    }

    Ok(())
}
