//! `wago` — run a Go-compiled WebAssembly module against the host bridge.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use wago_bridge::{Outcome, Runner, RunnerOptions};

#[derive(Parser)]
#[command(name = "wago")]
#[command(about = "Run Go-compiled WebAssembly modules", long_about = None)]
#[command(version)]
struct Cli {
    /// The .wasm module to run
    module: PathBuf,

    /// Arguments passed to the guest program
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,

    /// Environment entry (KEY=VALUE) for the guest; may repeat
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(err) => {
            eprintln!("wago: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let wasm = std::fs::read(&cli.module)
        .with_context(|| format!("reading {}", cli.module.display()))?;

    let mut env = BTreeMap::new();
    for entry in &cli.env {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("invalid --env entry {entry:?}, expected KEY=VALUE"))?;
        env.insert(key.to_string(), value.to_string());
    }

    // The guest toolchain's convention: argv[0] is the fixed program
    // name, real arguments follow.
    let mut argv = vec!["js".to_string()];
    argv.extend(cli.args.iter().cloned());

    let options = RunnerOptions {
        argv,
        env,
        globals: wago_shims::default_globals(),
    };
    let mut runner = Runner::new(&wasm, options)
        .with_context(|| format!("instantiating {}", cli.module.display()))?;

    match runner.run().context("running module")? {
        Outcome::Exited(code) => Ok(code),
        Outcome::Idle => {
            log::warn!("guest returned without exiting and has no pending timers");
            Ok(0)
        }
    }
}
