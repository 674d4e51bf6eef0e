use anyhow::Context;
use effort_core::{load_config, score_transcription, Slot, TranscriptionOutcome};
use serde_json::json;
use tracing::debug;

use crate::cli::args::ScoreArgs;
use crate::exit_codes;

pub fn run(args: ScoreArgs) -> anyhow::Result<i32> {
    let cfg = match load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", args.config.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let text = read_text(&args)?;
    let slot = Slot::from(args.slot);
    let slot_cfg = cfg.slot(slot);

    let outcome = score_transcription(slot_cfg, &text);
    debug!(%slot, accepted = outcome.is_accepted(), "scored");

    let report = json!({
        "slot": slot,
        "reference_text_length": slot_cfg.reference_text.max_distance(),
        "required_accuracy": slot_cfg.required_accuracy_percent(),
        "outcome": outcome,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match outcome {
        TranscriptionOutcome::Accepted { .. } => exit_codes::OK,
        TranscriptionOutcome::Rejected(_) => exit_codes::FAILED,
    })
}

fn read_text(args: &ScoreArgs) -> anyhow::Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    let path = args
        .text_file
        .as_ref()
        .context("either --text or --text-file is required")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(&raw)
        .to_string())
}
