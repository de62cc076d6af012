//! Command execution.
//!
//! Everything here returns errors; `main` turns them into a diagnostic and
//! an exit status.

use std::io::Write;

use anyhow::Context;
use rfortune_core::{FortuneContext, KvConnection, ManageConnection, RedisConnector};
use tokio::net::TcpListener;

use crate::cli::{Cli, Command};
use crate::http;

/// Connect to the configured backend and run the parsed command.
///
/// # Errors
/// Configuration, backend and I/O failures, with context.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.backend.config()?;
    let connector = RedisConnector::new(&config)?;
    tracing::debug!(backend = connector.address(), "using backend");

    let ctx = FortuneContext::new(connector, config.pool.clone());
    let result = execute(&ctx, cli, &mut std::io::stdout()).await;
    ctx.pool().close();
    result
}

/// Run the parsed command against `ctx`, printing results to `out`.
///
/// # Errors
/// Any failure from the core, or from writing to `out`.
pub async fn execute<M, W>(ctx: &FortuneContext<M>, cli: &Cli, out: &mut W) -> anyhow::Result<()>
where
    M: ManageConnection,
    M::Connection: KvConnection,
    W: Write,
{
    match &cli.command {
        None => {
            let fortune = ctx.pick_random(cli.query.module()).await?;
            writeln!(out, "{}", fortune.as_plain_text(cli.query.verbose))?;
        }

        Some(Command::Load { dir }) => {
            let dir = shellexpand::tilde(dir).to_string();
            let report = ctx
                .load_dir(&dir)
                .await
                .with_context(|| format!("loading {dir}"))?;
            for failure in &report.failed {
                tracing::warn!(module = %failure.module, error = %failure.error, "module not loaded");
            }
            tracing::info!(
                "Loaded {} fortunes from {} modules in {}",
                report.total(),
                report.modules.len(),
                dir
            );
            if !report.is_complete() {
                anyhow::bail!(
                    "{} of {} module files in {dir} could not be read",
                    report.failed.len(),
                    report.failed.len() + report.modules.len()
                );
            }
        }

        Some(Command::Serve { bind }) => {
            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            tracing::info!("Serving fortunes on http://{}", listener.local_addr()?);
            http::serve(ctx.clone(), listener, http::shutdown_signal()).await?;
            tracing::info!("Server stopped");
        }

        Some(Command::Modules { json }) => {
            let modules = ctx.list_modules().await?;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&modules)?)?;
            } else {
                for stats in &modules {
                    writeln!(out, "{}\t{}", stats.module, stats.count)?;
                }
            }
        }

        Some(Command::Get {
            module,
            id,
            verbose,
        }) => {
            let fortune = ctx.fetch(module, *id).await?;
            writeln!(out, "{}", fortune.as_plain_text(*verbose))?;
        }

        Some(Command::Clear { module, all }) => {
            let removed = match module {
                Some(module) if !*all => ctx.clear_module(module).await?,
                _ => ctx.clear_all().await?,
            };
            writeln!(out, "removed {removed} fortunes")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rfortune_core::{FortuneError, PoolConfig, SimConnector};

    async fn loaded_context() -> FortuneContext<SimConnector> {
        let ctx = FortuneContext::new(SimConnector::with_seed(3), PoolConfig::default());
        ctx.load_reader("zen", "breathe\n%\n".as_bytes()).await.unwrap();
        ctx.load_reader("wit", "quip one\n%\nquip two\n%\n".as_bytes())
            .await
            .unwrap();
        ctx
    }

    async fn output(ctx: &FortuneContext<SimConnector>, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        execute(ctx, &cli, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_query_prints_one_fortune() {
        let ctx = loaded_context().await;
        assert_eq!(output(&ctx, &["fortune", "zen"]).await.unwrap(), "breathe\n");
        assert_eq!(
            output(&ctx, &["fortune", "zen", "-v"]).await.unwrap(),
            "zen:1\nbreathe\n"
        );
    }

    #[tokio::test]
    async fn test_query_module_named_like_subcommand() {
        let ctx = loaded_context().await;
        ctx.load_reader("load", "reload\n%\n".as_bytes()).await.unwrap();
        assert_eq!(
            output(&ctx, &["fortune", "--module", "load"]).await.unwrap(),
            "reload\n"
        );
    }

    #[tokio::test]
    async fn test_query_unknown_module_fails() {
        let ctx = loaded_context().await;
        let err = output(&ctx, &["fortune", "nope"]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FortuneError>(),
            Some(FortuneError::ModuleNotFound(_))
        ));
        assert_eq!(err.to_string(), "module 'nope' not found");
    }

    #[tokio::test]
    async fn test_modules_table_and_json() {
        let ctx = loaded_context().await;
        assert_eq!(
            output(&ctx, &["fortune", "modules"]).await.unwrap(),
            "wit\t2\nzen\t1\n"
        );

        let json: serde_json::Value =
            serde_json::from_str(&output(&ctx, &["fortune", "modules", "--json"]).await.unwrap())
                .unwrap();
        assert_eq!(json[0]["mod"], "wit");
        assert_eq!(json[0]["count"], 2);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let ctx = loaded_context().await;
        assert_eq!(
            output(&ctx, &["fortune", "get", "wit", "3", "-v"]).await.unwrap(),
            "wit:3\nquip two\n"
        );
        assert!(output(&ctx, &["fortune", "get", "zen", "3"]).await.is_err());
    }

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("proverbs"), "a\n%\nb\n%\nc").unwrap();
        let ctx = FortuneContext::new(SimConnector::with_seed(3), PoolConfig::default());

        let path = dir.path().to_str().unwrap();
        assert_eq!(output(&ctx, &["fortune", "load", path]).await.unwrap(), "");
        assert_eq!(ctx.list_modules().await.unwrap()[0].count, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_with_unreadable_module_fails_after_loading_the_rest() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good"), "a\n%\n").unwrap();
        let locked = dir.path().join("locked");
        std::fs::write(&locked, "b\n%\n").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read(&locked).is_ok() {
            // Running as root; permissions are not enforced.
            return;
        }
        let ctx = FortuneContext::new(SimConnector::with_seed(3), PoolConfig::default());

        let path = dir.path().to_str().unwrap();
        let err = output(&ctx, &["fortune", "load", path]).await.unwrap_err();
        assert!(err.to_string().starts_with("1 of 2 module files"));
        assert_eq!(ctx.list_modules().await.unwrap()[0].module, "good");
    }

    #[tokio::test]
    async fn test_load_missing_directory_has_context() {
        let ctx = FortuneContext::new(SimConnector::with_seed(3), PoolConfig::default());
        let err = output(&ctx, &["fortune", "load", "/no/such/dir"])
            .await
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("loading /no/such/dir: cannot read"));
    }

    #[tokio::test]
    async fn test_clear() {
        let ctx = loaded_context().await;
        assert_eq!(
            output(&ctx, &["fortune", "clear", "wit"]).await.unwrap(),
            "removed 2 fortunes\n"
        );
        assert_eq!(
            output(&ctx, &["fortune", "clear", "--all"]).await.unwrap(),
            "removed 1 fortunes\n"
        );
        assert!(output(&ctx, &["fortune"]).await.is_err());
    }
}
