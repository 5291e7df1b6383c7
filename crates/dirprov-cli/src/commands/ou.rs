//! build-ou and resolve commands - organizational-unit paths

use super::CommandContext;
use anyhow::{Context, Result};
use colored::Colorize;
use dirprov_core::types::ContainerPath;
use dirprov_directory::{BindCredentials, DirectorySession, PathResolver};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PathOutput {
    dn: String,
    created: Vec<String>,
}

async fn open(ctx: &CommandContext, path: &str) -> Result<(DirectorySession, ContainerPath)> {
    let path = ContainerPath::parse(path)?;
    let (connector, _) = ctx.connector()?;
    let credentials = BindCredentials::from_config(&ctx.effective_config().directory);
    let session = DirectorySession::connect(connector.as_ref(), &credentials)
        .await
        .context("Failed to connect to directory")?;
    Ok((session, path))
}

pub async fn build(ctx: &CommandContext, path: &str) -> Result<()> {
    let (session, path) = open(ctx, path).await?;
    let resolution = PathResolver::new().resolve_or_create(&session, &path).await?;

    let output = PathOutput {
        dn: resolution.container.dn.clone(),
        created: resolution.created,
    };
    if ctx.is_json() {
        return ctx.print_json(&output);
    }

    for segment in &output.created {
        println!("{}: {}", "create_ou".green(), segment);
    }
    println!("{}", output.dn);
    Ok(())
}

pub async fn resolve(ctx: &CommandContext, path: &str) -> Result<()> {
    let (session, path) = open(ctx, path).await?;
    let container = PathResolver::new().resolve(&session, &path).await?;

    if ctx.is_json() {
        return ctx.print_json(&PathOutput {
            dn: container.dn,
            created: Vec::new(),
        });
    }
    println!("{}", container.dn);
    Ok(())
}
