use anyhow::Context;
use chrono::{DateTime, Utc};
use effort_core::{load_config, Arrival, EngineError, RecordPhase, Session, SessionReport};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::script::{load_script, Event};
use crate::cli::args::ReplayArgs;
use crate::exit_codes;

#[derive(Debug, Serialize)]
pub struct EventLog {
    pub index: usize,
    #[serde(flatten)]
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub generated_at: DateTime<Utc>,
    pub config: String,
    pub script: String,
    pub failed_events: usize,
    pub events: Vec<EventLog>,
    pub session: SessionReport,
}

pub fn run(args: ReplayArgs) -> anyhow::Result<i32> {
    let cfg = match load_config(&args.config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}: {}", args.config.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let script = match load_script(&args.script) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {:#}", args.script.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let mut session = match Session::new(cfg, script.groups) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", args.script.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let mut events = Vec::with_capacity(script.events.len());
    let mut failed = 0;
    for (index, event) in script.events.into_iter().enumerate() {
        match apply(&mut session, &event) {
            Ok(outcome) => events.push(EventLog {
                index,
                event,
                outcome: Some(outcome),
                error: None,
            }),
            Err(e) => {
                warn!(index, participant = %event.participant(), error = %e, "event failed");
                failed += 1;
                events.push(EventLog {
                    index,
                    event,
                    outcome: None,
                    error: Some(e.to_string()),
                });
                if !args.keep_going {
                    break;
                }
            }
        }
    }
    info!(events = events.len(), failed, "replay finished");

    let report = ReplayReport {
        generated_at: Utc::now(),
        config: args.config.display().to_string(),
        script: args.script.display().to_string(),
        failed_events: failed,
        events,
        session: session.report(),
    };
    let body = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => std::fs::write(path, body)
            .with_context(|| format!("failed to write report {}", path.display()))?,
        None => println!("{}", body),
    }

    Ok(if failed == 0 {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn apply(session: &mut Session, event: &Event) -> Result<Value, EngineError> {
    match event {
        Event::EnterRound { participant, round } => {
            let transcription = session.enter_round(participant, *round)?;
            Ok(json!({ "transcription": transcription }))
        }
        Event::Transcribe {
            participant,
            round,
            slot,
            text,
        } => {
            let outcome = session.submit_transcription(participant, *round, *slot, text)?;
            Ok(json!(outcome))
        }
        Event::FinishTranscription { participant, round } => {
            let finished = session.finish_transcription(participant, *round)?;
            Ok(json!({ "finished": finished }))
        }
        Event::ComputeIncome { participant, round } => {
            let income = session.compute_income(participant, *round)?;
            Ok(json!({ "income": income }))
        }
        Event::Contribute {
            participant,
            round,
            amount,
        } => {
            let needs_income = !matches!(
                session.participant(participant).and_then(|p| p.record(*round)),
                Some(r) if r.phase != RecordPhase::Transcribing
            );
            if needs_income {
                session.compute_income(participant, *round)?;
            }
            match session.contribute(participant, *round, *amount)? {
                Arrival::Waiting { arrived, expected } => Ok(json!({
                    "status": "waiting",
                    "arrived": arrived,
                    "expected": expected,
                })),
                Arrival::Released(settlement) => Ok(json!({
                    "status": "settled",
                    "settlement": settlement.as_ref(),
                })),
            }
        }
    }
}
