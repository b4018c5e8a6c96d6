use anyhow::Context;
use tracing::info;
use treemirror::config::MirrorConfig;
use treemirror::runtime::{MirrorRuntime, open_store, run_set_time};
use treemirror::sync::stamp::Stamp;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Transfer,
    Delete,
    SetTime { time: Stamp, path: Option<String> },
    Check,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(first) = args.next() else {
        return Ok(CliMode::Transfer);
    };
    let mode = match first.as_str() {
        "transfer" => CliMode::Transfer,
        "delete" => CliMode::Delete,
        "--check" => CliMode::Check,
        "--help" | "-h" => return Ok(CliMode::Help),
        "set-time" => {
            let mut time = None;
            let mut path = None;
            while let Some(flag) = args.next() {
                let value = args
                    .next()
                    .with_context(|| format!("{flag} requires a value"))?;
                match flag.as_str() {
                    "--time" => time = Some(Stamp::parse(&value)?),
                    "--path" => path = Some(value),
                    other => anyhow::bail!("unknown argument: {other}"),
                }
            }
            let time = time.context("set-time requires --time \"YYYY-MM-DD HH:MM:SS\"")?;
            return Ok(CliMode::SetTime { time, path });
        }
        other => anyhow::bail!("unknown argument: {other}"),
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("unknown argument: {extra}");
    }
    Ok(mode)
}

fn print_usage() {
    println!("Usage: treemirror [transfer|delete|set-time --time T [--path P]|--check]");
    println!("  transfer   Submit new and modified entries (default)");
    println!("  delete     Delete confirmed source files and prune empty directories");
    println!("  set-time   Stamp tracked entries with T (\"YYYY-MM-DD HH:MM:SS\", UTC)");
    println!("  --check    Validate configuration and exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        print_usage();
        return Ok(());
    }
    treemirror::logging::init();
    let config = MirrorConfig::from_env()?;
    match mode {
        CliMode::Check => {
            config.validate()?;
            info!(src = %config.src_dir, dst = %config.dst_dir, "configuration is valid");
        }
        CliMode::SetTime { time, path } => {
            let store = open_store(&config).await?;
            run_set_time(&config, &store, path.as_deref(), &time).await?;
        }
        CliMode::Transfer => {
            let report = MirrorRuntime::bootstrap(config).await?.run_transfer().await?;
            info!(
                directories = report.directories_created,
                files = report.files_submitted,
                "transfer run finished"
            );
        }
        CliMode::Delete => {
            let report = MirrorRuntime::bootstrap(config).await?.run_delete().await?;
            info!(
                files = report.files_deleted,
                directories = report.directories_pruned,
                outstanding = report.outstanding_tasks,
                "delete run finished"
            );
        }
        CliMode::Help => {}
    }
    Ok(())
}
