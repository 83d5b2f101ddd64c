//! Session Context behaviour: barge-in, sequential playback and digit reads.

mod common;

use aui_core::{AuiError, Outcome, PromptOptions, SessionOptions};
use common::{init_tracing, session, synth_session, Journal, MockDirect};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn barge_in_options() -> SessionOptions {
    SessionOptions {
        cancel_on_input: true,
        ..SessionOptions::default()
    }
}

fn no_barge_in_options() -> SessionOptions {
    SessionOptions {
        cancel_on_input: false,
        ..SessionOptions::default()
    }
}

#[tokio::test]
async fn digit_during_prompt_cancels_and_is_redelivered() {
    init_tracing();
    let h = synth_session(Duration::from_secs(5), barge_in_options());

    let handle = assert_ok!(h.ctx.say("Bitte wählen", PromptOptions::background()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.keypad.press("5");

    let started = Instant::now();
    let outcome = assert_ok!(handle.wait().await);
    assert!(started.elapsed() < Duration::from_secs(2));
    match outcome {
        Outcome::Cancelled { input: Some(event) } => assert_eq!(event.value, '5'),
        other => panic!("expected barge-in, got {other:?}"),
    }
    assert!(h.journal.count("player.stop") >= 1);

    let digit = h.ctx.get_digit(Some(Duration::from_millis(100))).await;
    assert_eq!(digit.map(|d| d.as_char()), Some('5'));
}

#[tokio::test]
async fn keyed_ahead_digits_survive_prompt_without_barge_in() {
    init_tracing();
    let h = synth_session(Duration::from_millis(30), no_barge_in_options());
    h.keypad.press("12#");

    let outcome = assert_ok!(h.ctx.say_wait("Bitte Ziffer eingeben").await);
    assert_eq!(outcome, Outcome::Completed);

    let digit = h.ctx.get_digit(Some(Duration::from_secs(5))).await;
    assert_eq!(digit.map(|d| d.as_char()), Some('1'));
    assert_eq!(h.ctx.digits().pending(), "2#");
}

#[tokio::test]
async fn prompt_text_is_normalised_before_synthesis() {
    let h = synth_session(Duration::from_millis(10), no_barge_in_options());
    assert_ok!(h.ctx.say_wait("Drücken Sie #").await);
    assert_eq!(h.journal.matching("synth:"), vec!["synth:Drücken Sie Raute"]);
}

#[tokio::test]
async fn per_call_override_disables_barge_in() {
    let h = synth_session(Duration::from_millis(150), barge_in_options());
    h.keypad.press("9");

    let handle = assert_ok!(
        h.ctx
            .say("Hinweis", PromptOptions::default().cancel_on_input(false))
            .await
    );
    assert_eq!(assert_ok!(handle.wait().await), Outcome::Completed);
    assert_eq!(h.ctx.digits().pending(), "9");
}

#[tokio::test]
async fn direct_engine_is_interrupted_on_barge_in() {
    init_tracing();
    let journal = Journal::default();
    let engine = Arc::new(MockDirect::new(journal.clone(), Duration::from_secs(5)));
    let h = session(engine, journal, barge_in_options());

    let handle = assert_ok!(h.ctx.say("Willkommen", PromptOptions::background()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.keypad.press("*");

    let outcome = assert_ok!(handle.wait().await);
    assert!(outcome.is_cancelled());
    assert!(h.journal.count("tts.interrupt") >= 1);

    let digit = h.ctx.get_digit(Some(Duration::from_millis(100))).await;
    assert_eq!(digit.map(|d| d.as_char()), Some('*'));
}

#[tokio::test]
async fn new_prompt_preempts_running_one() {
    let h = synth_session(Duration::from_secs(5), no_barge_in_options());

    let first = assert_ok!(h.ctx.say("erste", PromptOptions::background()).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = assert_ok!(h.ctx.say("zweite", PromptOptions::background()).await);

    assert_eq!(
        assert_ok!(first.wait().await),
        Outcome::Cancelled { input: None }
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    second.cancel();
    assert!(assert_ok!(second.wait().await).is_cancelled());
    assert_eq!(h.journal.matching("synth:"), vec!["synth:erste", "synth:zweite"]);
}

#[tokio::test]
async fn caller_token_cancels_playback() {
    let h = synth_session(Duration::from_secs(5), no_barge_in_options());
    let token = aui_core::CancelToken::new();

    let handle = assert_ok!(
        h.ctx
            .say(
                "lang",
                PromptOptions::background().with_token(token.clone())
            )
            .await
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();
    assert!(assert_ok!(handle.wait().await).is_cancelled());
    assert!(h.journal.count("player.stop") >= 1);
}

#[tokio::test]
async fn finished_prompt_releases_caller_token() {
    let h = synth_session(Duration::from_millis(10), no_barge_in_options());
    let token = aui_core::CancelToken::new();
    let handle = assert_ok!(
        h.ctx
            .say("kurz", PromptOptions::default().with_token(token.clone()))
            .await
    );
    assert_eq!(assert_ok!(handle.wait().await), Outcome::Completed);

    h.ctx.stop_audio().await;
    assert!(!token.is_cancelled());

    // A later prompt does not reach back to the finished one either.
    assert_ok!(h.ctx.say_wait("noch einmal").await);
    assert!(!token.is_cancelled());
}

#[tokio::test]
async fn stop_audio_is_safe_when_idle() {
    let h = synth_session(Duration::from_millis(10), barge_in_options());
    h.ctx.stop_audio().await;
    h.ctx.stop_audio().await;
    assert_eq!(h.journal.count("player.stop"), 2);
}

#[tokio::test]
async fn synthesis_failure_reaches_the_caller() {
    let journal = Journal::default();
    let engine = Arc::new(
        common::MockSynth::new("tone", journal.clone(), Duration::from_millis(10)).failing(),
    );
    let h = session(engine, journal, barge_in_options());

    let err = assert_err!(h.ctx.say("kaputt", PromptOptions::default()).await);
    assert!(matches!(err, AuiError::Synthesis(_)));

    let handle = assert_ok!(h.ctx.say("kaputt", PromptOptions::background()).await);
    assert!(matches!(handle.wait().await, Err(AuiError::Synthesis(_))));
}

#[tokio::test]
async fn confirm_maps_keys() {
    let h = synth_session(Duration::from_millis(10), no_barge_in_options());
    let timeout = Some(Duration::from_millis(200));

    h.keypad.press("1");
    assert_eq!(assert_ok!(h.ctx.confirm("Korrekt?", timeout).await), Some(true));
    h.keypad.press("2");
    assert_eq!(assert_ok!(h.ctx.confirm("Korrekt?", timeout).await), Some(false));
    h.keypad.press("7");
    assert_eq!(assert_ok!(h.ctx.confirm("Korrekt?", timeout).await), None);
    assert_eq!(assert_ok!(h.ctx.confirm("Korrekt?", timeout).await), None);
}

#[tokio::test]
async fn get_digit_times_out_with_none() {
    let h = synth_session(Duration::from_millis(10), barge_in_options());
    let started = Instant::now();
    assert!(h.ctx.get_digit(Some(Duration::from_millis(80))).await.is_none());
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn read_digits_stops_at_terminator() {
    let h = synth_session(Duration::from_millis(10), barge_in_options());
    h.keypad.press("4711#99");
    let pin = h
        .ctx
        .read_digits(10, Some(Duration::from_millis(100)), Some('#'))
        .await;
    assert_eq!(pin, "4711");
    assert_eq!(h.ctx.digits().pending(), "99");

    let rest = h.ctx.read_digits(1, Some(Duration::from_millis(100)), None).await;
    assert_eq!(rest, "9");
}

#[tokio::test]
async fn record_uses_transport_recorder() {
    let h = synth_session(Duration::from_millis(10), barge_in_options());
    let audio = assert_ok!(h.ctx.record(Duration::from_millis(250)).await);
    assert_eq!(audio.duration(), Duration::from_millis(250));
}

#[tokio::test]
async fn close_unbinds_the_keypad() {
    let h = synth_session(Duration::from_millis(10), barge_in_options());
    assert!(h.keypad.is_bound());
    h.ctx.close();
    assert!(!h.keypad.is_bound());
    h.keypad.press("1");
    assert!(h.ctx.digits().is_empty());
}
