//! End-to-end rounds through the session driver.

use effort_core::rounds::{EXACT_MATCH_MESSAGE, TOO_MANY_ERRORS_MESSAGE};
use effort_core::{
    parse_config, Arrival, EngineError, GroupId, GroupRoster, ParticipantId, RejectionCode,
    RoundPhase, Session, Slot, Stage, TaskProgress, TranscriptionOutcome,
};
use std::sync::Arc;

const CONFIG: &str = r#"
version: 1
players_per_group: 2
slots:
  - reference_text: "HELLO WORLD"
    allowed_error_rate: 0.0
  - reference_text: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
    allowed_error_rate: 0.1
rounds:
  - { transcription: true, tax: 0.5, multiplier: 2, end: 100 }
  - { transcription: true, tax: 0.5, multiplier: 2, end: 100 }
  - { transcription: false, tax: 0.25, multiplier: 3, end: 60 }
"#;

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s)
}

fn session() -> Session {
    let cfg = Arc::new(parse_config(CONFIG).unwrap());
    let roster = GroupRoster::new(GroupId::new("g1"), vec![pid("alice"), pid("bob")]);
    Session::new(cfg, vec![roster]).unwrap()
}

fn with_errors(n: usize) -> String {
    format!("{}{}", "b".repeat(n), "a".repeat(50 - n))
}

#[test]
fn hello_world_exact_slot() {
    let mut s = session();
    let alice = pid("alice");

    let typo = s
        .submit_transcription(&alice, 1, Slot::First, "HELLO W0RLD")
        .unwrap();
    let TranscriptionOutcome::Rejected(rejection) = typo else {
        panic!("typo must be rejected on the exact slot");
    };
    assert_eq!(rejection.code, RejectionCode::ExactMatchRequired);
    assert_eq!(rejection.message, EXACT_MATCH_MESSAGE);
    assert_eq!(rejection.distance, 1);
    assert_eq!(s.progress(&alice, 1).unwrap(), TaskProgress::PendingFirstTask);

    let exact = s
        .submit_transcription(&alice, 1, Slot::First, "HELLO WORLD")
        .unwrap();
    assert_eq!(
        exact,
        TranscriptionOutcome::Accepted {
            distance: 0,
            ratio: 1.0
        }
    );
    assert_eq!(s.progress(&alice, 1).unwrap(), TaskProgress::PendingSecondTask);
}

#[test]
fn tolerance_boundary_on_fifty_chars() {
    let mut s = session();
    let alice = pid("alice");

    s.submit_transcription(&alice, 1, Slot::First, "HELLO WORLD")
        .unwrap();
    let six = s
        .submit_transcription(&alice, 1, Slot::Second, &with_errors(6))
        .unwrap();
    let TranscriptionOutcome::Rejected(rejection) = six else {
        panic!("six errors must be rejected");
    };
    assert_eq!(rejection.code, RejectionCode::TooManyErrors);
    assert_eq!(rejection.message, TOO_MANY_ERRORS_MESSAGE);
    assert_eq!(rejection.allowed, 5);

    let five = s
        .submit_transcription(&alice, 1, Slot::Second, &with_errors(5))
        .unwrap();
    match five {
        TranscriptionOutcome::Accepted { distance, ratio } => {
            assert_eq!(distance, 5);
            assert!((ratio - (1.0 - 5.0 / 50.0)).abs() < 1e-12);
        }
        other => panic!("five errors must be accepted, got {:?}", other),
    }
}

#[test]
fn full_round_settles_group() {
    let mut s = session();
    let (alice, bob) = (pid("alice"), pid("bob"));
    let group = GroupId::new("g1");

    for p in [&alice, &bob] {
        s.submit_transcription(p, 1, Slot::First, "HELLO WORLD").unwrap();
    }
    // alice: 10 errors would be rejected, so land on 5 -> ratio 0.9
    s.submit_transcription(&alice, 1, Slot::Second, &with_errors(5))
        .unwrap();
    s.submit_transcription(&bob, 1, Slot::Second, &with_errors(0))
        .unwrap();
    assert_eq!(s.round_phase(&group, 1).unwrap(), RoundPhase::AwaitingTranscription);

    for p in [&alice, &bob] {
        assert!(s.is_displayed(p, 1, Stage::AccuracyResults).unwrap());
        assert!(s.finish_transcription(p, 1).unwrap());
    }

    let alice_income = s.compute_income(&alice, 1).unwrap();
    let bob_income = s.compute_income(&bob, 1).unwrap();
    assert!((alice_income - 90.0).abs() < 1e-9);
    assert_eq!(bob_income, 100.0);
    assert_eq!(s.round_phase(&group, 1).unwrap(), RoundPhase::AwaitingContributions);

    let view = s.contribution_view(&alice, 1).unwrap();
    assert_eq!(view.ratio, 0.9);
    assert_eq!(view.tax, 50.0);
    assert_eq!(view.contribution_max, alice_income);

    let first = s.contribute(&alice, 1, 40.0).unwrap();
    assert!(matches!(
        first,
        Arrival::Waiting {
            arrived: 1,
            expected: 2
        }
    ));
    assert!(s.group_record(&group, 1).is_none());
    assert!(s.group_results_view(&alice, 1).unwrap().is_none());
    assert!(!s.is_displayed(&alice, 1, Stage::GroupResults).unwrap());

    let second = s.contribute(&bob, 1, 60.0).unwrap();
    assert!(matches!(second, Arrival::Released(_)));
    assert_eq!(s.round_phase(&group, 1).unwrap(), RoundPhase::Settled);

    let record = s.group_record(&group, 1).unwrap();
    assert_eq!(record.total_contribution, 50.0);
    assert_eq!(record.total_earnings, 100.0);
    assert_eq!(record.individual_share, 50.0);

    let alice_payoff = s.participant(&alice).unwrap().record(1).unwrap().payoff;
    let bob_payoff = s.participant(&bob).unwrap().record(1).unwrap().payoff;
    assert!((alice_payoff - (90.0 - 20.0 + 50.0)).abs() < 1e-9);
    assert_eq!(bob_payoff, 100.0 - 30.0 + 50.0);

    let total_income = alice_income + bob_income;
    let expected = total_income - record.total_contribution + record.total_earnings;
    assert!((alice_payoff + bob_payoff - expected).abs() < 1e-9);

    let results = s.group_results_view(&bob, 1).unwrap().unwrap();
    assert_eq!(results.player_earnings, 50.0);
    assert_eq!(results.total_earnings, 100.0);
    assert!(s.is_displayed(&bob, 1, Stage::GroupResults).unwrap());
}

#[test]
fn transcription_done_gates_later_rounds_and_ratio_sticks() {
    let mut s = session();
    let alice = pid("alice");

    s.submit_transcription(&alice, 1, Slot::First, "HELLO WORLD")
        .unwrap();
    s.submit_transcription(&alice, 1, Slot::Second, &with_errors(4))
        .unwrap();
    s.finish_transcription(&alice, 1).unwrap();
    let r1 = s.compute_income(&alice, 1).unwrap();
    assert!((r1 - 92.0).abs() < 1e-9);

    // round 2 requires transcription, but alice is done
    assert!(!s.is_displayed(&alice, 2, Stage::Transcription(Slot::First)).unwrap());
    assert!(!s.is_displayed(&alice, 2, Stage::AccuracyResults).unwrap());
    assert_eq!(s.progress(&alice, 2).unwrap(), TaskProgress::Done);
    let err = s
        .submit_transcription(&alice, 2, Slot::First, "HELLO WORLD")
        .unwrap_err();
    assert!(matches!(err, EngineError::StageSkipped { round: 2, .. }));

    let r2 = s.compute_income(&alice, 2).unwrap();
    assert!((r2 - 92.0).abs() < 1e-9);

    // round 3 has no transcription at all; the worst ratio still applies
    let r3 = s.compute_income(&alice, 3).unwrap();
    assert!((r3 - 60.0 * 0.92).abs() < 1e-9);

    let history = s.accuracy_history(&alice).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].round_number, 1);
    assert_eq!(history[0].distance, 4);
    assert_eq!(history[0].reference_text_length, 50);
    assert_eq!(history[0].transcribed_text_length, 50);
}

#[test]
fn missing_submission_is_perfect_by_default() {
    let mut s = session();
    let bob = pid("bob");
    assert!(s.enter_round(&bob, 1).unwrap());
    let income = s.compute_income(&bob, 1).unwrap();
    assert_eq!(income, 100.0);

    let record = s.participant(&bob).unwrap().record(1).unwrap().clone();
    assert_eq!(record.transcribed_text.as_deref(), Some(""));
    assert_eq!(record.edit_distance, 0);
    assert_eq!(record.accuracy_ratio, 1.0);
}

#[test]
fn missing_submission_zero_policy() {
    let mut s = zero_policy_session();

    let income = s.compute_income(&pid("bob"), 1).unwrap();
    assert_eq!(income, 0.0);
    // the zero ratio sticks for the rest of the session
    assert_eq!(s.compute_income(&pid("bob"), 3).unwrap(), 0.0);
}

fn zero_policy_session() -> Session {
    let raw = format!("{}missing_submission: zero\n", CONFIG);
    let cfg = Arc::new(parse_config(&raw).unwrap());
    let roster = GroupRoster::new(GroupId::new("g1"), vec![pid("alice"), pid("bob")]);
    Session::new(cfg, vec![roster]).unwrap()
}

#[test]
fn zero_policy_leaves_untranscribed_round_at_endowment() {
    let mut s = zero_policy_session();
    let bob = pid("bob");
    assert!(!s.enter_round(&bob, 3).unwrap());
    assert_eq!(s.compute_income(&bob, 3).unwrap(), 60.0);
    assert_eq!(s.participant(&bob).unwrap().worst_ratio(), 1.0);
}

#[test]
fn round_entered_early_follows_finished_transcription() {
    let mut s = zero_policy_session();
    let alice = pid("alice");
    assert!(s.enter_round(&alice, 2).unwrap());

    s.submit_transcription(&alice, 1, Slot::First, "HELLO WORLD")
        .unwrap();
    s.submit_transcription(&alice, 1, Slot::Second, &with_errors(0))
        .unwrap();
    assert!(s.finish_transcription(&alice, 1).unwrap());
    assert_eq!(s.compute_income(&alice, 1).unwrap(), 100.0);

    assert!(!s
        .is_displayed(&alice, 2, Stage::Transcription(Slot::First))
        .unwrap());
    assert!(!s.enter_round(&alice, 2).unwrap());
    assert_eq!(s.compute_income(&alice, 2).unwrap(), 100.0);
}

#[test]
fn session_exposes_config_and_roster() {
    let s = session();
    assert_eq!(s.config().players_per_group, 2);
    assert_eq!(s.config().rounds.len(), 3);

    let mut ids: Vec<String> = s.participants().map(|p| p.id.to_string()).collect();
    ids.sort();
    assert_eq!(ids, ["alice", "bob"]);

    let view = s.transcription_view(Slot::Second);
    assert_eq!(view.slot, Slot::Second);
    assert_eq!(view.reference_text.chars().count(), 50);
    assert!((view.required_accuracy - 90.0).abs() < 1e-9);
}

#[test]
fn contribution_above_income_rejected() {
    let mut s = session();
    let alice = pid("alice");
    s.submit_transcription(&alice, 1, Slot::First, "HELLO WORLD")
        .unwrap();
    s.submit_transcription(&alice, 1, Slot::Second, &with_errors(5))
        .unwrap();
    s.compute_income(&alice, 1).unwrap();

    let err = s.contribute(&alice, 1, 95.0).unwrap_err();
    assert!(matches!(
        err,
        EngineError::ContributionOutOfRange { round: 1, .. }
    ));
    assert!(matches!(
        s.contribute(&alice, 1, 90.0).unwrap(),
        Arrival::Waiting { .. }
    ));
    let dup = s.contribute(&alice, 1, 10.0).unwrap_err();
    assert!(matches!(dup, EngineError::DuplicateContribution { .. }));
}

#[test]
fn unknown_round_and_participant() {
    let mut s = session();
    let err = s.compute_income(&pid("alice"), 9).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));

    let err = s.enter_round(&pid("mallory"), 1).unwrap_err();
    assert!(matches!(err, EngineError::UnknownParticipant(_)));
}

#[test]
fn roster_must_match_group_size() {
    let cfg = Arc::new(parse_config(CONFIG).unwrap());
    let roster = GroupRoster::new(GroupId::new("g1"), vec![pid("solo")]);
    assert!(Session::new(cfg, vec![roster]).is_err());
}

#[test]
fn report_serializes_settled_groups() {
    let mut s = session();
    for p in ["alice", "bob"] {
        s.compute_income(&pid(p), 3).unwrap();
        s.contribute(&pid(p), 3, 20.0).unwrap();
    }
    let report = s.report();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].round, 3);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["groups"][0]["individual_share"], 15.0);
    assert_eq!(json["participants"].as_array().unwrap().len(), 2);
}
