// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use llmnav_app::AppState;
use llmnav_store::{
    AuthService, Client, DEMO_PASSWORD, DEMO_USERNAME, MemoryStore, SessionFile,
    default_session_path,
};
use llmnav_tui::ViewOptions;
use runtime::StoreRuntime;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let session_path = default_session_path()?;
    if options.print_session_path {
        println!("{}", session_path.display());
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `llmnav --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    logging::init(&config.log_dir()?, config.log_level())?;
    info!(config = %options.config_path.display(), demo = options.demo, "starting");

    let view = ViewOptions {
        page_size: config.page_size(),
        popular_only: config.popular_only(),
    };
    let mut state = AppState::with_tab(config.default_tab());

    if options.demo {
        let mut store = MemoryStore::demo()?;
        store.detach_prompt_reads();
        let mut runtime = StoreRuntime::new(store, None);
        runtime.sign_in_with(DEMO_USERNAME, DEMO_PASSWORD)?;
        if options.check_only {
            return Ok(());
        }
        let result = llmnav_tui::run_app(&mut state, &mut runtime, view);
        runtime.shutdown();
        return result;
    }

    let client = Client::new(
        &config.backend_url()?,
        &config.anon_key()?,
        config.timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [backend] config in {}; fix url/anon_key/timeout values",
            options.config_path.display()
        )
    })?;
    let session_file = SessionFile::new(&session_path);

    if options.sign_out {
        return sign_out_stored(client, &session_file);
    }

    if options.check_only {
        client.ping()?;
        println!("backend reachable");
        return Ok(());
    }

    let mut runtime = StoreRuntime::new(client, Some(session_file));
    runtime.restore_session()?;
    let result = llmnav_tui::run_app(&mut state, &mut runtime, view);
    runtime.shutdown();
    result
}

/// Revoke and forget the persisted session without opening the TUI.
fn sign_out_stored(mut client: Client, session_file: &SessionFile) -> Result<()> {
    let Some(session) = session_file.load() else {
        println!("no stored session");
        return Ok(());
    };
    if let Err(error) = client.sign_out(&session) {
        warn!(error = %error, "remote sign out failed; clearing local session anyway");
    }
    session_file.clear()?;
    println!("signed out");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_session_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    sign_out: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_session_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        sign_out: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-session-path" => {
                options.print_session_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--sign-out" => {
                options.sign_out = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.demo && options.sign_out {
        anyhow::bail!("--sign-out has no effect with --demo; demo sessions are never stored");
    }

    Ok(options)
}

fn print_help() {
    println!("llmnav");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-session-path     Print where the signed-in session is stored");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch against seeded in-memory data");
    println!("  --check                  Validate config and reach the backend");
    println!("  --sign-out               Forget the stored session and exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/llmnav-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_session_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                sign_out: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.print_session_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_demo_and_session_path_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--demo", "--print-session-path"],
            default_options_path(),
        )?;
        assert!(!options.print_config_path);
        assert!(options.print_session_path);
        assert!(options.demo);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_sign_out_flag() -> Result<()> {
        let options = parse_cli_args(vec!["--sign-out"], default_options_path())?;
        assert!(options.sign_out);
        assert!(!options.check_only);
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_sign_out_in_demo_mode() {
        let error = parse_cli_args(vec!["--demo", "--sign-out"], default_options_path())
            .expect_err("demo sign-out should fail");
        assert!(error.to_string().contains("--sign-out"));
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
