// Tue Jan 13 2026 - Alex

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use module_dumper::config::{
    Config, ENV_CHUNK_SIZE, ENV_CONFIG, ENV_ENABLE, ENV_HOOKS, ENV_LOG, ENV_OUTPUT, ENV_SCAN_INTERVAL,
    ENV_SETTLE_DELAY, ENV_VERBOSE,
};
use std::path::{Path, PathBuf};
use std::process::Command;

const LIBRARY_NAME: &str = "libmodule_dumper.so";

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Dumps shared libraries from a running process via LD_PRELOAD", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program with the dumper preloaded
    Run {
        /// Sink target: a file path, unix:<path> or tcp:<host:port>
        #[arg(short, long)]
        output: Option<String>,

        /// JSON config file passed to the preloaded library
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        scan_interval_ms: Option<u64>,

        #[arg(long)]
        settle_delay_ms: Option<u64>,

        /// Loader functions to hook, comma separated
        #[arg(long)]
        hooks: Option<String>,

        /// Log file written by the preloaded library
        #[arg(long)]
        log: Option<PathBuf>,

        /// Explicit path to the preload library
        #[arg(long)]
        library: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,

        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Show where the preload library is and how to use it by hand
    Info,

    /// Write the default configuration as JSON
    InitConfig {
        #[arg(default_value = "module-dumper.json")]
        path: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            output,
            config,
            chunk_size,
            scan_interval_ms,
            settle_delay_ms,
            hooks,
            log,
            library,
            verbose,
            command,
        } => {
            let options = RunOptions {
                output,
                config,
                chunk_size,
                scan_interval_ms,
                settle_delay_ms,
                hooks,
                log,
                verbose,
            };
            handle_run(library.as_deref(), &options, &command)
        }
        Commands::Info => handle_info(),
        Commands::InitConfig { path } => handle_init_config(&path),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "[!]".red(), e);
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    output: Option<String>,
    config: Option<PathBuf>,
    chunk_size: Option<usize>,
    scan_interval_ms: Option<u64>,
    settle_delay_ms: Option<u64>,
    hooks: Option<String>,
    log: Option<PathBuf>,
    verbose: bool,
}

impl RunOptions {
    /// The `MODDUMP_*` variables handed to the child.
    fn env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![(ENV_ENABLE, "1".to_string())];

        if let Some(path) = &self.config {
            vars.push((ENV_CONFIG, path.display().to_string()));
        }
        if let Some(output) = &self.output {
            vars.push((ENV_OUTPUT, output.clone()));
        }
        if let Some(size) = self.chunk_size {
            vars.push((ENV_CHUNK_SIZE, size.to_string()));
        }
        if let Some(interval) = self.scan_interval_ms {
            vars.push((ENV_SCAN_INTERVAL, interval.to_string()));
        }
        if let Some(delay) = self.settle_delay_ms {
            vars.push((ENV_SETTLE_DELAY, delay.to_string()));
        }
        if let Some(hooks) = &self.hooks {
            vars.push((ENV_HOOKS, hooks.clone()));
        }
        if let Some(log) = &self.log {
            vars.push((ENV_LOG, log.display().to_string()));
        }
        if self.verbose {
            vars.push((ENV_VERBOSE, "1".to_string()));
        }

        vars
    }

    /// Catches bad values before the child starts rather than inside it.
    fn check(&self) -> Result<()> {
        let vars = self.env_vars();
        Config::from_lookup(|name| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone()))
            .context("Invalid dumper configuration")?;
        Ok(())
    }
}

/// Next to this executable first, then the usual cargo output directories.
fn find_preload_library() -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(lib_path) = exe_dir
        .as_ref()
        .map(|d| d.join(LIBRARY_NAME))
        .filter(|p| p.exists())
    {
        return Some(lib_path);
    }

    ["target/release", "target/debug"]
        .iter()
        .map(|dir| Path::new(dir).join(LIBRARY_NAME))
        .find(|p| p.exists())
        .and_then(|p| std::fs::canonicalize(p).ok())
}

fn handle_run(library: Option<&Path>, options: &RunOptions, command: &[String]) -> Result<i32> {
    let lib = match library {
        Some(path) => std::fs::canonicalize(path)
            .with_context(|| format!("Preload library {} not found", path.display()))?,
        None => find_preload_library().context("Preload library not found, build it with cargo build --release")?,
    };

    let Some((program, rest)) = command.split_first() else {
        bail!("No command specified");
    };

    options.check()?;

    let preload = match std::env::var("LD_PRELOAD") {
        Ok(existing) if !existing.is_empty() => format!("{}:{}", lib.display(), existing),
        _ => lib.display().to_string(),
    };

    let mut cmd = Command::new(program);
    cmd.args(rest);
    cmd.env("LD_PRELOAD", &preload);
    for (name, value) in options.env_vars() {
        cmd.env(name, value);
    }

    println!("{} Preloading {}", "[*]".blue(), lib.display());
    println!(
        "{} Output: {}",
        "[*]".blue(),
        options.output.as_deref().unwrap_or("default (see MODDUMP_OUTPUT)")
    );
    println!("{} Running: {}", "[*]".blue(), command.join(" "));
    println!();

    let status = cmd
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if status.success() {
        println!("{} {} exited cleanly", "[+]".green(), program);
    } else {
        println!("{} {} exited with {}", "[!]".yellow(), program, status);
    }

    Ok(status.code().unwrap_or(1))
}

fn handle_info() -> Result<i32> {
    let lib = find_preload_library().context("Preload library not found, build it with cargo build --release")?;

    println!("{} {}", "Preload library:".cyan().bold(), lib.display());
    println!();
    println!("Usage:");
    println!("  {}=1 LD_PRELOAD={} ./program", ENV_ENABLE, lib.display());
    println!();
    println!("Environment variables:");
    println!("  {:<26} Turn the dumper on (required)", format!("{}=1", ENV_ENABLE));
    println!("  {:<26} JSON config file", format!("{}=<path>", ENV_CONFIG));
    println!("  {:<26} File, unix:<path> or tcp:<host:port>", format!("{}=<target>", ENV_OUTPUT));
    println!("  {:<26} Bytes per chunk", format!("{}=<n>", ENV_CHUNK_SIZE));
    println!("  {:<26} Period of the memory scan", format!("{}=<ms>", ENV_SCAN_INTERVAL));
    println!("  {:<26} Wait after a load before dumping", format!("{}=<ms>", ENV_SETTLE_DELAY));
    println!("  {:<26} Loader functions to hook", format!("{}=<a,b>", ENV_HOOKS));
    println!("  {:<26} Log file", format!("{}=<path>", ENV_LOG));
    println!("  {:<26} Debug logging", format!("{}=1", ENV_VERBOSE));

    Ok(0)
}

fn handle_init_config(path: &Path) -> Result<i32> {
    Config::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Default configuration written to {}", "[+]".green(), path.display());
    Ok(0)
}
