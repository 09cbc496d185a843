use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use rayon::prelude::*;
use serde_json::json;
use transfer_valuation::response::{ValuationRequest, ValuationResponse};
use transfer_valuation::{global_engine, init_runtime};

fn main() -> anyhow::Result<()> {
    init_runtime();
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/batch_requests.json"));

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let requests: Vec<ValuationRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("{} must hold a JSON array of requests", path.display()))?;

    let engine = global_engine();
    let results: Vec<Result<ValuationResponse, String>> = requests
        .par_iter()
        .map(|request| engine.handle(request).map_err(|err| err.to_string()))
        .collect();

    let mut ok = 0usize;
    let mut adjusted = 0usize;
    let mut roi_sum = 0.0;
    for (idx, result) in results.iter().enumerate() {
        match result {
            Ok(response) => {
                ok += 1;
                if response.roi_analysis.adjusted {
                    adjusted += 1;
                }
                roi_sum += response.model_roi;
                println!("{}", serde_json::to_string(response)?);
            }
            Err(err) => println!("{}", json!({ "index": idx, "error": err })),
        }
    }

    let status = engine.status();
    let summary = json!({
        "summary": {
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "source": path.display().to_string(),
            "total": results.len(),
            "ok": ok,
            "failed": results.len() - ok,
            "adjusted_to_target": adjusted,
            "mean_model_roi": if ok > 0 { roi_sum / ok as f64 } else { 0.0 },
            "models_loaded": status.all_models_loaded,
            "generation": status.generation,
        }
    });
    println!("{summary}");
    Ok(())
}
