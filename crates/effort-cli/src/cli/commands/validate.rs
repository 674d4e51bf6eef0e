use effort_core::{load_config, Slot};
use serde_json::json;
use tracing::{error, info};

use crate::cli::args::ValidateArgs;
use crate::exit_codes;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let cfg = match load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(config = %args.config.display(), error = %e, "config rejected");
            eprintln!("{}: {}", args.config.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let slots: Vec<_> = Slot::ALL
        .iter()
        .map(|&slot| {
            let s = cfg.slot(slot);
            json!({
                "slot": slot,
                "reference_text_length": s.reference_text.max_distance(),
                "allowed_error_rate": s.allowed_error_rate,
                "required_accuracy": s.required_accuracy_percent(),
            })
        })
        .collect();
    let rounds: Vec<_> = cfg
        .rounds
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "round": i + 1,
                "requires_transcription": r.requires_transcription,
                "tax_rate": r.tax_rate,
                "multiplier": r.multiplier,
                "baseline_endowment": r.baseline_endowment,
            })
        })
        .collect();

    let summary = json!({
        "config": args.config.display().to_string(),
        "version": cfg.version,
        "players_per_group": cfg.players_per_group,
        "missing_submission": cfg.missing_submission,
        "slots": slots,
        "rounds": rounds,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!(rounds = cfg.num_rounds(), "config ok");
    Ok(exit_codes::OK)
}
