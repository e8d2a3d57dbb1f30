//! Session state machine scenarios
//!
//! Drives the machine directly with a fake engine and checks the published
//! states, the engine calls and the prepared media after each step.

mod common;

use common::{media, EngineCall, Harness};
use pxplayer_session::{EngineEvent, EngineMessage, PlaybackState, SessionEvent};
use std::time::Duration;

// ===== Play =====

#[test]
fn test_play_on_empty_queue_does_nothing() {
    let mut harness = Harness::new();

    harness.machine.play();

    assert!(harness.drain_events().is_empty());
    assert_eq!(harness.log.created(), 0);
    assert!(!harness.machine.is_active());
}

#[test]
fn test_first_play_prepares_activates_and_plays() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);

    harness.machine.play();

    let events = harness.drain_events();
    assert!(matches!(
        &events[0],
        SessionEvent::MetadataChanged(Some(media)) if media.id == "a"
    ));
    assert!(matches!(events[1], SessionEvent::ActiveChanged(true)));
    assert!(matches!(
        &events[2],
        SessionEvent::PlaybackStateChanged(status) if status.state == PlaybackState::Playing
    ));
    assert_eq!(harness.log.loads(), vec!["a"]);
}

#[test]
fn test_engine_ready_keeps_playing() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.machine.play();
    harness.drain_events();

    let sender = harness.log.last_sender();
    sender.send(EngineEvent::Buffering);
    sender.send(EngineEvent::Ready);
    harness.pump_engine();

    assert_eq!(
        harness.published_states(),
        vec![PlaybackState::Buffering, PlaybackState::Playing]
    );
}

#[test]
fn test_pause_then_play_resumes_same_engine() {
    let mut harness = Harness::with_media(&[("a", 5000)]);

    harness.machine.play();
    harness.machine.pause();
    harness.machine.play();

    assert_eq!(harness.log.created(), 1);
    assert_eq!(
        harness.published_states(),
        vec![
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Playing
        ]
    );
}

// ===== Seek =====

#[test]
fn test_seek_past_duration_moves_to_next_and_plays() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();
    assert_eq!(harness.machine.status().state, PlaybackState::Playing);

    harness.machine.seek_to(6000);

    assert_eq!(harness.machine.queue().current_index(), Some(1));
    assert_eq!(harness.machine.prepared().unwrap().id, "b");
    assert_eq!(harness.machine.status().state, PlaybackState::Playing);
    assert_eq!(harness.log.loads(), vec!["a", "b"]);
}

#[test]
fn test_seek_while_paused_stays_paused() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.machine.play();
    harness.machine.pause();

    harness.machine.seek_to(2500);

    assert_eq!(harness.machine.status().state, PlaybackState::Paused);
    assert_eq!(
        harness.log.calls().last(),
        Some(&EngineCall::Seek(Duration::from_millis(2500)))
    );
}

#[test]
fn test_seek_to_exact_duration_does_not_skip() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();

    harness.machine.seek_to(5000);

    assert_eq!(harness.machine.queue().current_index(), Some(0));
}

#[test]
fn test_remote_seek_actions_move_relative_to_position() {
    let mut harness = Harness::with_media(&[("a", 120_000)]);
    harness.machine.play();
    harness.machine.pause();
    harness.machine.seek_to(40_000);

    harness.machine.seek_relative(false, pxplayer_session::SEEK_BACKWARD_STEP);
    assert_eq!(
        harness.log.calls().last(),
        Some(&EngineCall::Seek(Duration::from_secs(30)))
    );

    harness.machine.seek_relative(true, pxplayer_session::SEEK_FORWARD_STEP);
    assert_eq!(
        harness.log.calls().last(),
        Some(&EngineCall::Seek(Duration::from_secs(60)))
    );
}

// ===== Skip =====

#[test]
fn test_skip_when_not_playing_loads_paused() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);

    harness.machine.skip_to_next();

    assert_eq!(harness.machine.queue().current_index(), Some(1));
    assert_eq!(harness.machine.prepared().unwrap().id, "b");
    assert_eq!(harness.log.loads(), vec!["b"]);
    assert_eq!(harness.published_states(), vec![PlaybackState::Paused]);
}

#[test]
fn test_skip_previous_while_playing_publishes_skip_then_plays() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000), ("c", 4000)]);
    harness.machine.play();
    harness.drain_events();

    harness.machine.skip_to_previous();

    assert_eq!(harness.machine.queue().current_index(), Some(2));
    assert_eq!(
        harness.published_states(),
        vec![PlaybackState::SkippingToPrevious, PlaybackState::Playing]
    );
}

#[test]
fn test_skip_on_empty_queue_is_noop() {
    let mut harness = Harness::new();

    harness.machine.skip_to_next();
    harness.machine.skip_to_previous();

    assert!(harness.drain_events().is_empty());
    assert_eq!(harness.machine.queue().current_index(), None);
}

// ===== Engine lifecycle =====

#[test]
fn test_end_of_media_continues_with_next_item() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();
    harness.drain_events();

    harness.log.last_sender().send(EngineEvent::Ended);
    harness.pump_engine();

    assert_eq!(harness.machine.queue().current_index(), Some(1));
    assert_eq!(
        harness.published_states(),
        vec![
            PlaybackState::Paused,
            PlaybackState::SkippingToNext,
            PlaybackState::Paused,
            PlaybackState::Playing
        ]
    );
}

#[test]
fn test_events_from_released_engine_are_ignored() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();
    let old = harness.log.last_sender();
    harness.machine.stop();
    harness.drain_events();

    old.send(EngineEvent::Ended);
    harness.pump_engine();

    assert!(harness.drain_events().is_empty());
    assert_eq!(harness.machine.queue().current_index(), Some(0));
}

#[test]
fn test_engine_error_stops_and_reports() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.machine.play();
    harness.drain_events();

    let generation = harness.log.last_sender().generation();
    harness.machine.handle_engine_event(EngineMessage {
        generation,
        event: EngineEvent::Error("stream reset".to_string()),
    });

    let events = harness.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::Error { message } if message == "stream reset")));
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::ActiveChanged(false))));
    assert_eq!(harness.machine.status().state, PlaybackState::Stopped);
    assert_eq!(harness.log.calls().last(), Some(&EngineCall::Release));
}

#[test]
fn test_engine_load_failure_deactivates_session() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.log.fail_loads(true);

    harness.machine.play();

    let events = harness.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::Error { .. })));
    assert!(harness.machine.prepared().is_none());
    assert!(!harness.machine.is_active());
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::PlaybackStateChanged(status) if status.state == PlaybackState::Stopped
    )));
    assert_eq!(harness.machine.status().state, PlaybackState::Stopped);
}

#[test]
fn test_load_failure_on_skip_while_playing_stops() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();
    harness.drain_events();
    harness.log.fail_loads(true);

    harness.machine.skip_to_next();

    assert_eq!(
        harness.published_states(),
        vec![PlaybackState::SkippingToNext, PlaybackState::Stopped]
    );
    assert_eq!(harness.machine.status().state, PlaybackState::Stopped);
    assert_eq!(harness.machine.status().position, Duration::ZERO);
    assert!(!harness.machine.buffer_progress_active());
    assert!(!harness.machine.is_active());
    assert_eq!(harness.machine.queue().current_index(), Some(1));
}

#[test]
fn test_load_failure_after_end_of_media_stops() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();
    harness.drain_events();
    harness.log.fail_loads(true);

    let generation = harness.log.last_sender().generation();
    harness.machine.handle_engine_event(EngineMessage {
        generation,
        event: EngineEvent::Ended,
    });

    let states = harness.published_states();
    assert_eq!(states.first(), Some(&PlaybackState::Paused));
    assert_eq!(states.last(), Some(&PlaybackState::Stopped));
    assert_eq!(harness.machine.status().state, PlaybackState::Stopped);
    assert!(harness.machine.prepared().is_none());
    assert!(!harness.machine.is_active());
}

// ===== Stop / play-at / shutdown =====

#[test]
fn test_stop_then_play_starts_fresh_engine() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.machine.play();
    harness.machine.stop();

    harness.machine.play();

    assert_eq!(harness.log.created(), 2);
    assert!(harness.machine.is_active());
    assert_eq!(harness.machine.status().state, PlaybackState::Playing);
}

#[test]
fn test_play_at_starts_item_from_beginning() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000), ("c", 4000)]);
    harness.machine.play();
    harness.machine.seek_to(2000);

    harness.machine.play_at(1).unwrap();

    assert_eq!(harness.machine.prepared().unwrap().id, "b");
    assert_eq!(harness.machine.status().position, Duration::ZERO);
    assert_eq!(harness.machine.status().state, PlaybackState::Playing);
}

#[test]
fn test_queued_descriptor_used_when_library_misses() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.library.clear();

    harness.machine.prepare();

    assert_eq!(harness.machine.prepared().unwrap().id, "a");
}

#[test]
fn test_prepare_prefers_library_metadata() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    let mut renamed = media("a", 5000);
    renamed.title = "Renamed".to_string();
    pxplayer_session::MediaCatalog::add_media(harness.library.as_ref(), renamed);

    harness.machine.prepare();

    assert_eq!(harness.machine.prepared().unwrap().title, "Renamed");
}

#[test]
fn test_snapshot_reflects_session() {
    let mut harness = Harness::with_media(&[("a", 5000), ("b", 3000)]);
    harness.machine.play();

    let snapshot = harness.machine.snapshot();

    assert_eq!(snapshot.queue.len(), 2);
    assert_eq!(snapshot.cursor, Some(0));
    assert!(snapshot.active);
    assert_eq!(snapshot.now_playing.unwrap().id, "a");
    assert_eq!(snapshot.status.state, PlaybackState::Playing);
}

#[test]
fn test_shutdown_releases_engine_and_announces_teardown() {
    let mut harness = Harness::with_media(&[("a", 5000)]);
    harness.machine.play();
    harness.drain_events();

    harness.machine.shutdown();

    let events = harness.drain_events();
    assert!(matches!(events.last(), Some(SessionEvent::SessionDestroyed)));
    assert!(!harness.machine.is_active());
    assert_eq!(harness.log.calls().last(), Some(&EngineCall::Release));
}
