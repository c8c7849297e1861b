//! assessctl - assessment org-unit reconciliation and metadata provisioning
//!
//! ## Commands
//!
//! - `reconcile`: map external org units onto local ones, keeping manual rows
//! - `plan`: expand a provisioning request into templates (dry run)
//! - `provision`: create or reuse the planned metadata on a remote instance

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

use assessment_core::{
    reconcile, CancellationToken, JobStatus, MappingTable, MatchCounts, OrgUnit, ProgressEvent,
    ProvisionStatus, ProvisioningConfig, ProvisioningEngine, ProvisioningJob, ProvisioningPlan,
    ProvisioningRequest, RandomIdGenerator, Severity, SubmissionStrategy,
};
use assessment_remote::{HttpMetadataStore, MetadataStore, RemoteConfig};

#[derive(Parser)]
#[command(name = "assessctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assessment reconciliation and metadata provisioning", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map external org units onto local org units
    Reconcile {
        /// External org units (JSON array)
        #[arg(long)]
        external: PathBuf,

        /// Local org units (JSON array)
        #[arg(long)]
        local: PathBuf,

        /// Previously saved mapping table; manual rows are preserved
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Write the resulting mapping table and counts here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Expand a provisioning request into templates without contacting the remote
    Plan {
        /// Provisioning request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Provisioning config overrides (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Provision data elements and datasets on the remote instance
    Provision {
        /// Provisioning request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Provisioning config overrides (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base URL of the remote instance
        #[arg(long, env = "ASSESS_REMOTE_URL")]
        url: String,

        /// Basic-auth username
        #[arg(long, env = "ASSESS_REMOTE_USERNAME")]
        username: String,

        /// Basic-auth password
        #[arg(long, env = "ASSESS_REMOTE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Submission strategy (per-object or bulk); overrides the config file
        #[arg(long)]
        strategy: Option<SubmissionStrategy>,

        /// Always create fresh objects, never reuse existing ones
        #[arg(long)]
        no_reuse: bool,

        /// Write the provisioning summary here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileOutput {
    counts: MatchCounts,
    ambiguous_local_names: Vec<String>,
    mappings: MappingTable,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    assessment_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Reconcile {
            external,
            local,
            mapping,
            output,
        } => {
            let result = cmd_reconcile(&external, &local, mapping.as_deref(), output.as_deref())?;
            println!("{}", render_reconcile_text(&result));
            Ok(())
        }
        Commands::Plan {
            request,
            config,
            output,
        } => cmd_plan(&request, config.as_deref(), output.as_deref()),
        Commands::Provision {
            request,
            config,
            url,
            username,
            password,
            strategy,
            no_reuse,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(strategy) = strategy {
                config = config.with_strategy(strategy);
            }
            let mut request: ProvisioningRequest = read_json_file(&request)?;
            if no_reuse {
                request.reuse_existing = false;
            }

            let store = HttpMetadataStore::new(RemoteConfig::new(url, username, password))
                .context("Failed to build remote client")?;
            let engine = ProvisioningEngine::new(
                Arc::new(store) as Arc<dyn MetadataStore>,
                Arc::new(RandomIdGenerator::new()),
            )
            .with_config(config);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current object");
                    on_interrupt.cancel();
                }
            });

            let job = cmd_provision(&engine, &request, &cancel, output.as_deref()).await?;
            match job.status {
                JobStatus::Cancelled => bail!("Provisioning cancelled"),
                JobStatus::CompletedWithFailures => {
                    bail!("{} object(s) failed to provision", job.failed().len())
                }
                _ => Ok(()),
            }
        }
    }
}

fn cmd_reconcile(
    external: &Path,
    local: &Path,
    mapping: Option<&Path>,
    output: Option<&Path>,
) -> Result<ReconcileOutput> {
    let external: Vec<OrgUnit> = read_json_file(external)?;
    let local: Vec<OrgUnit> = read_json_file(local)?;
    let existing: MappingTable = match mapping {
        Some(path) => read_json_file(path)?,
        None => MappingTable::default(),
    };

    let result = reconcile(&external, &local, existing.rows());
    info!(
        external = external.len(),
        local = local.len(),
        manual = result.counts.manual,
        "reconciled org units"
    );

    let out = ReconcileOutput {
        counts: result.counts,
        ambiguous_local_names: result.ambiguous_local_names,
        mappings: result.table,
    };
    if let Some(path) = output {
        write_json_file(path, &out)?;
    }
    Ok(out)
}

fn cmd_plan(request: &Path, config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let request: ProvisioningRequest = read_json_file(request)?;
    let config = load_config(config)?;
    let plan = ProvisioningPlan::build(&request, &config, &RandomIdGenerator::new())
        .context("Failed to build provisioning plan")?;

    match output {
        Some(path) => {
            write_json_file(path, &plan)?;
            println!(
                "Planned {} data elements and {} datasets -> {}",
                plan.element_count(),
                plan.datasets.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

/// Run one provisioning job, printing progress as it arrives.
async fn cmd_provision(
    engine: &ProvisioningEngine,
    request: &ProvisioningRequest,
    cancel: &CancellationToken,
    output: Option<&Path>,
) -> Result<ProvisioningJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", render_progress(&event));
        }
    });

    // The sender is dropped when the run ends, which closes the printer.
    let result = engine.provision(request, Some(tx), cancel).await;
    printer.await.context("Progress printer panicked")?;
    let job = result.context("Provisioning failed")?;

    println!("{}", render_summary(&job));
    if let Some(path) = output {
        write_json_file(path, &job.summary())?;
    }
    Ok(job)
}

fn load_config(path: Option<&Path>) -> Result<ProvisioningConfig> {
    match path {
        Some(path) => read_json_file(path),
        None => Ok(ProvisioningConfig::default()),
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

fn render_reconcile_text(out: &ReconcileOutput) -> String {
    let mut text = String::new();
    text.push_str("Org Unit Mapping\n");
    text.push_str("================\n");
    for row in out.mappings.rows() {
        let origin = if row.is_manual() { " (manual)" } else { "" };
        text.push_str(&format!(
            "  {} -> {} [{:?}]{}\n",
            row.external_id,
            row.local_id.as_deref().unwrap_or("-"),
            row.confidence,
            origin
        ));
    }
    text.push_str(&format!(
        "\nexact: {}  partial: {}  none: {}  manual: {}\n",
        out.counts.exact, out.counts.partial, out.counts.none, out.counts.manual
    ));
    if !out.ambiguous_local_names.is_empty() {
        text.push_str(&format!(
            "ambiguous local names: {}\n",
            out.ambiguous_local_names.join(", ")
        ));
    }
    text.trim_end().to_string()
}

fn render_progress(event: &ProgressEvent) -> String {
    let marker = match event.severity {
        Severity::Info => "  ",
        Severity::Success => "ok",
        Severity::Warning => "!!",
        Severity::Error => "xx",
    };
    format!(
        "[{}/{}] {} {}",
        event.step, event.total_steps, marker, event.message
    )
}

fn status_label(status: ProvisionStatus) -> &'static str {
    match status {
        ProvisionStatus::Created => "created",
        ProvisionStatus::Reused => "reused",
        ProvisionStatus::Failed => "FAILED",
    }
}

fn render_summary(job: &ProvisioningJob) -> String {
    let mut text = format!(
        "\nProvisioning '{}' ({:?}, category combo {})\n",
        job.assessment, job.status, job.category_combo
    );
    for object in job.objects() {
        text.push_str(&format!(
            "  {:<7} {:<12} {:<9} {:<14} {}\n",
            status_label(object.status),
            object.kind.to_string(),
            object.dataset_type.to_string(),
            object.code,
            object.remote_id.as_deref().unwrap_or("-"),
        ));
        if let Some(error) = &object.error {
            text.push_str(&format!("          {}\n", error));
        }
    }
    text.push_str(&format!(
        "\ncreated: {}  reused: {}  failed: {}  ({} ms)",
        job.count(ProvisionStatus::Created),
        job.count(ProvisionStatus::Reused),
        job.count(ProvisionStatus::Failed),
        job.duration_ms()
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::SequenceIdGenerator;
    use assessment_remote::fakes::{CreateFailure, MemoryMetadataStore};

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn request() -> ProvisioningRequest {
        ProvisioningRequest::new("Malaria Assessment 2026", "").with_org_units(["OU1"])
    }

    #[test]
    fn test_provision_args_parse() {
        let cli = Cli::try_parse_from([
            "assessctl",
            "provision",
            "--request",
            "req.json",
            "--url",
            "https://play.example.org",
            "--username",
            "admin",
            "--password",
            "district",
            "--strategy",
            "bulk",
            "--no-reuse",
        ])
        .unwrap();

        match cli.command {
            Commands::Provision {
                url,
                strategy,
                no_reuse,
                ..
            } => {
                assert_eq!(url, "https://play.example.org");
                assert_eq!(strategy, Some(SubmissionStrategy::Bulk));
                assert!(no_reuse);
            }
            _ => panic!("expected provision"),
        }
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let parsed = Cli::try_parse_from([
            "assessctl",
            "provision",
            "--request",
            "req.json",
            "--url",
            "u",
            "--username",
            "a",
            "--password",
            "p",
            "--strategy",
            "parallel",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_reconcile_writes_mapping_table() {
        let dir = tempfile::tempdir().unwrap();
        let external = write(
            dir.path(),
            "external.json",
            r#"[{"id":"E1","displayName":"Ngelehun CHC"},{"id":"E2","displayName":"Mahera Clinic Annex"},{"id":"E3","displayName":"Tikonko"}]"#,
        );
        let local = write(
            dir.path(),
            "local.json",
            r#"[{"id":"L1","displayName":"Ngelehun CHC"},{"id":"L2","displayName":"Mahera Clinic"}]"#,
        );
        let output = dir.path().join("mapping.json");

        let out = cmd_reconcile(&external, &local, None, Some(&output)).unwrap();
        assert_eq!(out.counts.exact, 1);
        assert_eq!(out.counts.partial, 1);
        assert_eq!(out.counts.none, 1);

        let saved: serde_json::Value = read_json_file(&output).unwrap();
        assert_eq!(saved["mappings"].as_array().unwrap().len(), 3);
        assert_eq!(saved["mappings"][1]["localId"], "L2");

        let text = render_reconcile_text(&out);
        assert!(text.contains("E3 -> - [None]"));
    }

    #[test]
    fn test_reconcile_resumes_from_saved_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let external = write(
            dir.path(),
            "external.json",
            r#"[{"id":"E1","displayName":"Ngelehun CHC"}]"#,
        );
        let local = write(
            dir.path(),
            "local.json",
            r#"[{"id":"L1","displayName":"Ngelehun CHC"},{"id":"L9","displayName":"Bo"}]"#,
        );
        let mapping = write(
            dir.path(),
            "mapping.json",
            r#"[{"externalId":"E1","localId":"L9","confidence":"exact","origin":"manual"}]"#,
        );

        let out = cmd_reconcile(&external, &local, Some(&mapping), None).unwrap();
        assert_eq!(out.mappings.local_for("E1"), Some("L9"));
        assert_eq!(out.counts.manual, 1);
        assert!(render_reconcile_text(&out).contains("(manual)"));
    }

    #[test]
    fn test_missing_input_file_reports_path() {
        let err = cmd_reconcile(
            Path::new("/nonexistent/external.json"),
            Path::new("/nonexistent/local.json"),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("external.json"));
    }

    #[test]
    fn test_plan_writes_templates() {
        let dir = tempfile::tempdir().unwrap();
        let request = write(
            dir.path(),
            "request.json",
            r#"{"assessmentName":"Malaria Assessment 2026","orgUnitIds":["OU1"],"sources":[{"id":"s1","name":"Confirmed cases","valueType":"NUMBER","aggregationType":"SUM"}]}"#,
        );
        let config = write(dir.path(), "config.json", r#"{"periodType":"Quarterly"}"#);
        let output = dir.path().join("plan.json");

        cmd_plan(&request, Some(&config), Some(&output)).unwrap();

        let plan: serde_json::Value = read_json_file(&output).unwrap();
        assert_eq!(plan["datasets"].as_array().unwrap().len(), 4);
        assert_eq!(plan["datasets"][0]["periodType"], "Quarterly");
        assert_eq!(plan["dataElements"]["summary"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provision_against_fake_store() {
        let store = Arc::new(MemoryMetadataStore::new());
        let engine = ProvisioningEngine::new(store.clone(), Arc::new(SequenceIdGenerator::new()));
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("summary.json");

        let job = cmd_provision(&engine, &request(), &CancellationToken::new(), Some(&output))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.count(ProvisionStatus::Created), 16);
        let summary: serde_json::Value = read_json_file(&output).unwrap();
        assert_eq!(summary["dataElements"].as_array().unwrap().len(), 12);
        assert_eq!(summary["categoryCombo"], "bjDvmb4bfuf");
    }

    #[tokio::test]
    async fn test_summary_flags_failed_objects() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.push_create_failure(CreateFailure::Reject);
        store.push_create_failure(CreateFailure::Reject);
        let engine = ProvisioningEngine::new(store, Arc::new(SequenceIdGenerator::new()));

        let job = cmd_provision(&engine, &request(), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::CompletedWithFailures);
        let text = render_summary(&job);
        assert!(text.contains("FAILED"));
        assert!(text.contains("failed: 1"));
    }

    #[test]
    fn test_render_progress_marks_severity() {
        let event = ProgressEvent {
            seq: 3,
            step: 4,
            total_steps: 6,
            message: "Created data element".to_string(),
            severity: Severity::Success,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(render_progress(&event), "[4/6] ok Created data element");
    }
}
