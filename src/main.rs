use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use shaderfx::{Config, batch};

const USAGE: &str = "usage: shaderfx <file.kfx|dir> [--output-dir <dir>] [--config <file.json>] [--jobs <n>] [--check] [--emit-spirv]";

#[derive(Debug, Default, Clone)]
struct Cli {
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    jobs: Option<usize>,
    check: bool,
    emit_spirv: bool,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--check" => {
                cli.check = true;
                i += 1;
            }
            "--emit-spirv" => {
                cli.emit_spirv = true;
                i += 1;
            }
            "--outputdir" | "--output-dir" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --output-dir"));
                };
                cli.output_dir = Some(PathBuf::from(v));
                i += 2;
            }
            "--config" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --config"));
                };
                cli.config = Some(PathBuf::from(v));
                i += 2;
            }
            "--jobs" | "-j" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --jobs"));
                };
                let n = v
                    .parse()
                    .map_err(|e| anyhow!("invalid value for --jobs: {v} ({e})"))?;
                cli.jobs = Some(n);
                i += 2;
            }
            other if other.starts_with('-') => {
                return Err(anyhow!("unknown argument: {other}\n{USAGE}"));
            }
            other => {
                if cli.input.is_some() {
                    return Err(anyhow!("more than one input given: {other}\n{USAGE}"));
                }
                cli.input = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }
    Ok(cli)
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    config.check_only |= cli.check;
    config.emit_spirv |= cli.emit_spirv;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    let Some(input) = cli.input.clone() else {
        bail!("{USAGE}");
    };
    let config = resolve_config(&cli)?;

    let report = batch::compile_path(&input, &config)?;
    let done = report.written.len() + report.checked.len();
    log::info!("{done} succeeded, {} failed", report.failed.len());
    if !report.is_success() {
        bail!("{} effect(s) failed to compile", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_cli_input_and_flags() {
        let cli = parse_cli(&args(&[
            "shaders",
            "--output-dir",
            "out",
            "--jobs",
            "4",
            "--check",
        ]))
        .unwrap();
        assert_eq!(cli.input.as_ref().unwrap(), &PathBuf::from("shaders"));
        assert_eq!(cli.output_dir.as_ref().unwrap(), &PathBuf::from("out"));
        assert_eq!(cli.jobs, Some(4));
        assert!(cli.check);
        assert!(!cli.emit_spirv);
    }

    #[test]
    fn parse_cli_rejects_unknown_and_dangling() {
        assert!(parse_cli(&args(&["--frobnicate"])).is_err());
        assert!(parse_cli(&args(&["a.kfx", "--jobs"])).is_err());
        assert!(parse_cli(&args(&["a.kfx", "--jobs", "many"])).is_err());
        assert!(parse_cli(&args(&["a.kfx", "b.kfx"])).is_err());
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = parse_cli(&args(&["x.kfx", "--emit-spirv", "--jobs", "2"])).unwrap();
        let config = resolve_config(&cli).unwrap();
        assert!(config.emit_spirv);
        assert_eq!(config.jobs, 2);
        assert_eq!(config.artifact_extension, "kfxb");
    }
}
