//! convoy CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use convoy::Cli;
use convoy_core::config::ConfigLoader;
use convoy_core::context::WorkspaceContext;
use convoy_core::release::{self, ExecuteMode};
use convoy_core::workspace::Workspace;
use convoy_core::{gather, propagate};
use tracing::{debug, warn};

mod observability;
mod render;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    observability::init(env_filter);

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        execute = cli.execute,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    if let Some(ref package) = cli.package {
        warn!(package, "package filter is accepted but not applied yet");
    }

    let mode = if cli.execute {
        ExecuteMode::Execute
    } else {
        ExecuteMode::DryRun
    };

    let ctx = WorkspaceContext::new(cwd, config);
    let result = run(&ctx, mode);
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

fn run(ctx: &WorkspaceContext, mode: ExecuteMode) -> anyhow::Result<()> {
    let workspace = Workspace::load(ctx).context("failed to load workspace")?;
    let candidates =
        gather::gather_all(ctx, &workspace).context("failed to gather release candidates")?;
    let plan = propagate::plan(candidates).context("failed to order releases")?;

    render::print_header(mode);
    release::execute_plan(ctx, &plan, mode, &mut |event| {
        render::handle_event(&event, mode);
    })
    .context("release failed")
}
