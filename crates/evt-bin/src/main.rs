//! Eventide entrypoint.
//!
//! Exit codes: 0 success, 1 configuration error, 2 runtime error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use core_config::{dump_example, load_steering};
use core_plugin::{plugin_paths_from_env, PluginManager};
use core_runtime::{Application, FrameworkError, PLUGIN_ENV};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "eventide",
    version,
    about = "Multi-threaded event-processing framework"
)]
struct Args {
    /// Path to the TOML steering file.
    pub steering: Option<PathBuf>,

    /// Override a steering parameter: section[.subsection].param=value.
    #[arg(short = 'p', long = "param", value_name = "SPEC")]
    pub overrides: Vec<String>,

    /// Number of worker threads (overrides [scheduler] nthreads).
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Print a default steering file and exit.
    #[arg(long)]
    pub dump_example: bool,

    /// Load plugin libraries, print the registry, and exit.
    #[arg(long)]
    pub dump_plugins: bool,
}

fn dump_plugins() -> Result<(), FrameworkError> {
    let mut plugins = PluginManager::new()?;
    plugins.load_libraries(&plugin_paths_from_env(PLUGIN_ENV))?;
    print!("{}", plugins.dump());
    Ok(())
}

fn run(args: &Args) -> Result<(), FrameworkError> {
    let Some(steering) = &args.steering else {
        return Err(core_config::ConfigError::Steering(
            "no steering file given (try --dump-example)".to_string(),
        )
        .into());
    };
    let mut config = load_steering(steering)?;
    for spec in &args.overrides {
        config.apply_override(spec)?;
    }
    let mut application = Application::new(config);
    if let Some(nthreads) = args.nthreads {
        application.set_nthreads(nthreads);
    }
    let summary = application.run()?;
    println!(
        "eventide: processed {} events ({} run headers){}",
        summary.events_finished,
        summary.run_headers,
        if summary.stopped {
            ", stopped by processor request"
        } else {
            ""
        }
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.dump_example {
        print!("{}", dump_example());
        return ExitCode::SUCCESS;
    }

    let result = if args.dump_plugins {
        dump_plugins()
    } else {
        run(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(target: "runtime", error = %err, "fatal");
            eprintln!("eventide: error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
