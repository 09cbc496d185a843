use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use serde_json::Value;
use transfer_valuation::player::RawPlayer;
use transfer_valuation::response::{ClubRef, ValuationRequest};
use transfer_valuation::{global_engine, init_runtime};

const USAGE: &str = "usage: valuate <request.json> [--club NAME] [--roi N]\n       \
                     valuate --player '<json>' [--club NAME] [--roi N]\n       \
                     valuate --status";
const VALUE_FLAGS: [&str; 3] = ["--player", "--club", "--roi"];

fn main() -> anyhow::Result<()> {
    init_runtime();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let engine = global_engine();

    if args.iter().any(|a| a == "--status") {
        println!("{}", serde_json::to_string_pretty(&engine.status())?);
        return Ok(());
    }

    let mut request = match arg_value(&args, "--player") {
        Some(raw) => {
            let player: RawPlayer =
                serde_json::from_str(&raw).context("--player must be a JSON object")?;
            ValuationRequest::new(player, None, None)
        }
        None => {
            let Some(path) = positional(&args).map(PathBuf::from) else {
                bail!("{USAGE}");
            };
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse request {}", path.display()))?
        }
    };

    if let Some(club) = arg_value(&args, "--club") {
        request.club = Some(ClubRef::Name(club));
    }
    if let Some(raw) = arg_value(&args, "--roi") {
        let target = raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("--roi expects a number, got {raw}"))?;
        request.roi_target = Value::from(target);
    }

    let response = engine.handle(&request).context("valuation failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.clone());
        }
    }
    None
}

fn positional(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}
