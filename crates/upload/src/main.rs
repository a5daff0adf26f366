//! KoboToolbox spreadsheet uploader.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use kobo_api::{KoboApi, KoboClient};
use kobo_tabular::{read_table_path, write_template};
use kobo_upload::{
    Command, LoadedForm, Mode, SubmissionRunner, SubmitArgs, UploadConfig, Verdict, init_logging,
    prepare_rows,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = UploadConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let kf_base = config.kf_base().context("KPI URL is not configured")?;
    let kc_base = config.kc_base().context("KoBoCAT URL is not configured")?;
    info!(
        server = %config.server,
        kf = %kf_base,
        kc = %kc_base,
        "Starting kobo-upload"
    );
    let client = KoboClient::with_config(&kf_base, &kc_base, config.token(), config.client_config())?;

    match &config.command {
        Command::Projects => list_projects(&client).await,
        Command::Template { asset, out } => template(&client, asset, out.as_deref()).await,
        Command::Export { asset, out } => export(&client, asset, out.as_deref()).await,
        Command::Submit(args) | Command::Edit(args) => {
            let mode = config
                .command
                .mode()
                .context("submission command without a mode")?;
            submit(&client, args, mode).await
        }
    }
}

async fn list_projects(client: &KoboClient) -> anyhow::Result<()> {
    let assets = client.list_assets().await?;
    info!(projects = assets.len(), "Listed projects");
    for asset in &assets {
        println!("{}\t{}", asset.uid, asset.display_name());
    }
    Ok(())
}

async fn template(client: &KoboClient, asset: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let form = LoadedForm::load(client, asset).await?;
    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}_template.xlsx", form.form_id)));
    write_template(&path, form.template.columns())
        .with_context(|| format!("Failed to write template to {}", path.display()))?;
    println!("Template written to {}", path.display());
    Ok(())
}

async fn export(client: &KoboClient, asset: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let form = LoadedForm::load(client, asset).await?;
    let bytes = client
        .export_data(asset)
        .await
        .context("Export failed")?;
    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}_export.xlsx", form.form_id)));
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    println!("Export written to {}", path.display());
    Ok(())
}

async fn submit(client: &KoboClient, args: &SubmitArgs, mode: Mode) -> anyhow::Result<()> {
    let form = LoadedForm::load(client, &args.asset).await?;
    let table = read_table_path(&args.file, None)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let prepared = prepare_rows(table, mode, &form.template);
    if let Some(note) = prepared.normalization.and_then(|n| n.describe()) {
        println!("Loaded {} rows ({note})", prepared.rows.len());
    } else {
        println!("Ready to submit {} rows", prepared.rows.len());
    }

    let summary = SubmissionRunner::for_form(client, &form, mode)
        .run(&prepared.rows)
        .await?;

    std::fs::write(&args.report, summary.to_csv()?)
        .with_context(|| format!("Failed to write report to {}", args.report.display()))?;

    println!(
        "Processed: {}  Success: {}  Failed: {}  Skipped: {}",
        summary.processed(),
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    );
    println!("Report written to {}", args.report.display());
    let verdict = summary.verdict();
    println!("{verdict}");

    if verdict != Verdict::AllSucceeded {
        std::process::exit(2);
    }
    Ok(())
}
