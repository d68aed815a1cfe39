use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use league_api::{
    LeagueApi, SeedPlanRequest, SetSettingsRequest, SubmitRequest as ApiSubmitRequest,
};
use league_core::{parse_date, LeagueSetting, SettingName};
use league_seedgen::SeedgenClient;
use league_store_sqlite::SqliteStore;
use serde_json::Value;
use time::Date;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "league")]
#[command(about = "Rando League settings CLI")]
struct Cli {
    #[arg(long, default_value = "./league.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    Settings {
        #[command(subcommand)]
        command: Box<SettingsCommand>,
    },
    Seed {
        #[command(subcommand)]
        command: Box<SeedCommand>,
    },
    Runner {
        #[command(subcommand)]
        command: Box<RunnerCommand>,
    },
    Submit(SubmitArgs),
    Sweep(SweepArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    Export(DbExportArgs),
    Import(DbImportArgs),
    Backup(DbBackupArgs),
    Restore(DbRestoreArgs),
    IntegrityCheck,
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct DbExportArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
    /// Skip rows that already exist instead of failing the import.
    #[arg(long)]
    skip_existing: bool,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbRestoreArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Set(SettingsSetArgs),
    View(PeriodArgs),
    Clear(PeriodArgs),
}

#[derive(Debug, Args)]
struct SettingsSetArgs {
    #[arg(long)]
    date: Option<String>,
    /// Setting assignment in `name=value` form, repeatable.
    #[arg(long = "set", required = true)]
    set: Vec<String>,
}

#[derive(Debug, Args)]
struct PeriodArgs {
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Subcommand)]
enum SeedCommand {
    Plan(SeedArgs),
    Fetch(SeedArgs),
}

#[derive(Debug, Args)]
struct SeedArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum RunnerCommand {
    Add(RunnerAddArgs),
    List,
}

#[derive(Debug, Args)]
struct RunnerAddArgs {
    #[arg(long)]
    name: String,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[arg(long)]
    runner: String,
    #[arg(long)]
    time: String,
    #[arg(long)]
    vod: String,
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Args)]
struct SweepArgs {
    #[arg(long)]
    date: Option<String>,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = LeagueApi::new(cli.db.clone());
    match cli.command {
        Command::Db { command } => {
            let mut store = SqliteStore::open(&cli.db)?;
            run_db(*command, &mut store)
        }
        Command::Settings { command } => run_settings(*command, &api),
        Command::Seed { command } => run_seed(*command, &api),
        Command::Runner { command } => run_runner(*command, &api),
        Command::Submit(args) => run_submit(args, &api),
        Command::Sweep(args) => run_sweep(&args, &api),
    }
}

fn run_db(command: DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = store.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty(),
                "inferred_from_legacy": status.inferred_from_legacy
            }))
        }
        DbCommand::Migrate(args) => run_db_migrate(&args, store),
        DbCommand::Export(args) => {
            store.migrate()?;
            let manifest = store.export_snapshot(&args.out)?;
            emit_json(serde_json::json!({
                "out_dir": args.out,
                "manifest": manifest
            }))
        }
        DbCommand::Import(args) => {
            let summary = store.import_snapshot(&args.input, args.skip_existing)?;
            emit_json(serde_json::json!({
                "in_dir": args.input,
                "skip_existing": args.skip_existing,
                "summary": summary
            }))
        }
        DbCommand::Backup(args) => {
            store.migrate()?;
            store.backup_database(&args.out)?;
            emit_json(serde_json::json!({
                "backup_path": args.out,
                "status": "ok"
            }))
        }
        DbCommand::Restore(args) => {
            store.restore_database(&args.input)?;
            let status = store.schema_status()?;
            emit_json(serde_json::json!({
                "restored_from": args.input,
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions
            }))
        }
        DbCommand::IntegrityCheck => {
            let report = store.integrity_check()?;
            emit_json(
                serde_json::to_value(&report).context("failed to serialize integrity report")?,
            )
        }
    }
}

fn run_db_migrate(args: &DbMigrateArgs, store: &mut SqliteStore) -> Result<()> {
    let before = store.schema_status()?;
    if args.dry_run {
        emit_json(serde_json::json!({
            "dry_run": true,
            "current_version": before.current_version,
            "target_version": before.target_version,
            "would_apply_versions": before.pending_versions,
            "inferred_from_legacy": before.inferred_from_legacy
        }))?;
        return Ok(());
    }

    store.migrate()?;
    let after = store.schema_status()?;
    emit_json(serde_json::json!({
        "dry_run": false,
        "before_version": before.current_version,
        "applied_versions": before.pending_versions,
        "after_version": after.current_version,
        "target_version": after.target_version,
        "up_to_date": after.pending_versions.is_empty()
    }))
}

fn run_settings(command: SettingsCommand, api: &LeagueApi) -> Result<()> {
    match command {
        SettingsCommand::Set(args) => {
            let date = parse_optional_date(args.date.as_deref())?;
            let settings = args
                .set
                .iter()
                .map(|assignment| parse_setting_assignment(assignment))
                .collect::<Result<Vec<_>>>()?;

            let view = api.set_settings(SetSettingsRequest { date, settings })?;
            emit_json(serde_json::to_value(&view).context("failed to serialize settings view")?)
        }
        SettingsCommand::View(args) => {
            let view = api.view_settings(parse_optional_date(args.date.as_deref())?)?;
            emit_json(serde_json::to_value(&view).context("failed to serialize settings view")?)
        }
        SettingsCommand::Clear(args) => {
            let result = api.clear_settings(parse_optional_date(args.date.as_deref())?)?;
            emit_json(serde_json::to_value(&result).context("failed to serialize clear result")?)
        }
    }
}

fn run_seed(command: SeedCommand, api: &LeagueApi) -> Result<()> {
    match command {
        SeedCommand::Plan(args) => {
            let plan = api.seed_plan(SeedPlanRequest {
                date: parse_optional_date(args.date.as_deref())?,
                base_url: args.base_url,
            })?;
            emit_json(serde_json::to_value(&plan).context("failed to serialize seed plan")?)
        }
        SeedCommand::Fetch(args) => {
            let base_url =
                args.base_url.clone().unwrap_or_else(|| league_seedgen::DEFAULT_BASE_URL.to_string());
            let plan = api.seed_plan(SeedPlanRequest {
                date: parse_optional_date(args.date.as_deref())?,
                base_url: args.base_url,
            })?;
            let bundle = SeedgenClient::new(base_url).fetch(&plan)?;
            emit_json(serde_json::json!({
                "plan": plan,
                "bundle": bundle
            }))
        }
    }
}

fn run_runner(command: RunnerCommand, api: &LeagueApi) -> Result<()> {
    match command {
        RunnerCommand::Add(args) => {
            let result = api.register_runner(&args.name)?;
            emit_json(serde_json::to_value(&result).context("failed to serialize runner result")?)
        }
        RunnerCommand::List => {
            let runners = api.list_runners()?;
            emit_json(serde_json::json!({ "runners": runners }))
        }
    }
}

fn run_submit(args: SubmitArgs, api: &LeagueApi) -> Result<()> {
    let submission = api.submit(ApiSubmitRequest {
        date: parse_optional_date(args.date.as_deref())?,
        runner: args.runner,
        time: args.time,
        vod: args.vod,
    })?;
    emit_json(serde_json::to_value(&submission).context("failed to serialize submission")?)
}

fn run_sweep(args: &SweepArgs, api: &LeagueApi) -> Result<()> {
    let report = api.sweep(parse_optional_date(args.date.as_deref())?)?;
    emit_json(serde_json::to_value(&report).context("failed to serialize sweep report")?)
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<Date>> {
    value.map(|raw| parse_date(raw).map_err(|err| anyhow!("{err}"))).transpose()
}

fn parse_setting_assignment(assignment: &str) -> Result<LeagueSetting> {
    let (name_raw, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("setting assignment MUST be name=value (received: {assignment})"))?;
    let name = SettingName::parse(name_raw)
        .ok_or_else(|| anyhow!("unknown setting name: {name_raw}"))?;
    if value.is_empty() {
        return Err(anyhow!("setting {name} MUST have a non-empty value"));
    }

    Ok(LeagueSetting { name, value: value.to_string() })
}
