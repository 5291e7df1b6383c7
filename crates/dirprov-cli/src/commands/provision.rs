//! provision command - create one user entry from a request file

use super::CommandContext;
use anyhow::{Context, Result};
use colored::Colorize;
use dirprov_core::types::{ProvisioningReport, ReportStatus};
use dirprov_provisioning::{
    render_failure, ProvisioningRequest, ProvisioningWorkflow, WORKFLOW_COMPONENT,
};
use std::io::Read;
use tracing::{info, warn};

pub async fn execute(ctx: &CommandContext, request_path: &str) -> Result<()> {
    let request = read_request(request_path)?;
    let (connector, memory) = ctx.connector()?;

    if let Some(directory) = &memory {
        let segments: Vec<&str> = request.path.iter().collect();
        directory.add_container_path(&segments);
        for group in &request.groups {
            directory.add_group(group);
        }
        info!("Dry run against an in-memory directory");
    }

    let workflow = ProvisioningWorkflow::from_config(connector, &ctx.effective_config())?;

    let token = workflow.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping before the next stage");
            token.cancel();
        }
    });

    let outcome = workflow.run(&request).await;
    let report = &outcome.report;

    if ctx.is_json() {
        ctx.print_json(report)?;
    } else {
        print_report(report);
    }
    // Secret goes to stderr only
    if let Some(password) = &outcome.initial_password {
        eprintln!("{}: {}", "initial password".bold(), password);
    }

    let status = report.status;
    match status {
        ReportStatus::Completed => Ok(()),
        ReportStatus::Partial => anyhow::bail!("Entry created, but some operations failed"),
        ReportStatus::NotCreated => match outcome.fatal {
            Some(e) => {
                let code = e.code();
                Err(e).context(format!("Provisioning failed ({})", code))
            }
            None => anyhow::bail!("Provisioning failed"),
        },
    }
}

fn read_request(path: &str) -> Result<ProvisioningRequest> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };

    serde_json::from_str(&content).context("Invalid provisioning request")
}

fn print_report(report: &ProvisioningReport) {
    let status = match report.status {
        ReportStatus::Completed => "completed".green(),
        ReportStatus::Partial => "partial".yellow(),
        ReportStatus::NotCreated => "not created".red(),
    };
    println!("{}: {}", "status".bold(), status);
    if let Some(dn) = &report.entry_dn {
        println!("{}: {}", "entry".bold(), dn);
    }
    println!("{}: {}", "stage".bold(), report.stage_reached);
    if let Some(stage) = report.failed_at {
        println!("{}: {}", "failed at".bold(), stage);
    }
    if report.entry_created() {
        let credential = if report.credential_set { "set".green() } else { "not set".red() };
        println!("{}: {}", "credential".bold(), credential);
    }

    for outcome in &report.group_outcomes {
        match &outcome.cause {
            None => println!("  {} {}", "ok".green(), outcome.group),
            Some(cause) => println!("  {} {}: {}", "failed".red(), outcome.group, cause),
        }
    }
    for outcome in &report.membership_outcomes {
        match &outcome.cause {
            None if outcome.already_member => {
                println!("  {} member of {} (already present)", "ok".green(), outcome.group)
            }
            None => println!("  {} member of {}", "ok".green(), outcome.group),
            Some(cause) => println!("  {} member of {}: {}", "failed".red(), outcome.group, cause),
        }
    }

    if report.terminal_error.is_some() {
        eprintln!();
        eprint!(
            "{}",
            render_failure(
                WORKFLOW_COMPONENT,
                report.terminal_error.as_ref(),
                report.trace.iter().map(String::as_str),
            )
        );
    }
}
