//! Live session lifecycle against an in-process backend

mod common;

use std::sync::atomic::Ordering;

use common::{stereo_block, CountingFactory, Events, FailingFactory, FakeBackend};
use rnnoise_duplex::audio::{Session, SessionError, SessionState};
use rnnoise_duplex::config::ConfigError;
use rnnoise_duplex::dsp::{FilterMode, ModelError};
use rnnoise_duplex::AudioConfig;

fn session() -> (Session<FakeBackend, CountingFactory>, FakeBackend, CountingFactory, Events) {
    let events = Events::default();
    let backend = FakeBackend::with_events(events.clone());
    let factory = CountingFactory::new(events.clone());
    let session = Session::new(backend.clone(), factory.clone());
    (session, backend, factory, events)
}

#[test]
fn test_start_processes_after_warm_up() {
    let (mut session, backend, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(factory.live(), 1);

    let input = stereo_block(1000, 480);
    let mut output = vec![7i16; 960];

    // First frame primes the model and is never heard
    assert!(backend.device.run_duplex(&mut output, Some(&input), 480));
    assert!(output.iter().all(|&s| s == 0));

    assert!(backend.device.run_duplex(&mut output, Some(&input), 480));
    assert!(output.iter().all(|&s| s == 1500), "expected l + r/2 on both channels");
    assert_eq!(factory.calls(), 2);

    let level = session.level().take().unwrap();
    assert!((level - 1500.0 / 32768.0).abs() < 1e-4);
}

#[test]
fn test_bypass_session_skips_model() {
    let (mut session, backend, factory, _) = session();
    let config = AudioConfig {
        filter_mode: FilterMode::Bypass,
        ..AudioConfig::default()
    };
    session.start(&config).unwrap();

    let input: Vec<i16> = (0..480).flat_map(|i| [i as i16, -(i as i16)]).collect();
    let mut output = vec![0i16; 960];
    backend.device.run_duplex(&mut output, Some(&input), 480);

    for (i, pair) in output.chunks(2).enumerate() {
        let l = i as i32;
        let expected = (l + (-l) / 2) as i16;
        assert_eq!(pair, [expected, expected]);
    }
    assert_eq!(factory.calls(), 0);
}

#[test]
fn test_invalid_config_allocates_nothing() {
    let (mut session, backend, factory, _) = session();
    let config = AudioConfig {
        sample_rate: 44100,
        ..AudioConfig::default()
    };

    let err = session.start(&config).unwrap_err();
    assert!(matches!(err, SessionError::Config(ConfigError::UnsupportedSampleRate(44100))));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(factory.created(), 0);
    assert_eq!(backend.device.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_blank_device_name_rejected() {
    let (mut session, _, factory, _) = session();
    let config = AudioConfig {
        input_device: Some("  ".to_string()),
        ..AudioConfig::default()
    };
    assert!(matches!(
        session.start(&config),
        Err(SessionError::Config(ConfigError::NoDeviceSelected("input")))
    ));
    assert_eq!(factory.created(), 0);
}

#[test]
fn test_model_failure_rolls_back() {
    let backend = FakeBackend::new();
    let mut session = Session::new(backend.clone(), FailingFactory);

    let err = session.start(&AudioConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::Model(ModelError::Create(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.last_error().is_some());
    assert_eq!(backend.device.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_frame_size_mismatch_rolls_back() {
    let events = Events::default();
    let backend = FakeBackend::with_events(events.clone());
    let factory = CountingFactory::with_frame_size(256, events);
    let mut session = Session::new(backend.clone(), factory.clone());

    let err = session.start(&AudioConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::Model(ModelError::FrameSizeMismatch { .. })));
    assert_eq!(factory.created(), 1);
    assert_eq!(factory.live(), 0);
    assert_eq!(backend.device.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_device_open_failure_releases_model() {
    let (mut session, backend, factory, _) = session();
    backend.device.fail_open.store(true, Ordering::SeqCst);

    let err = session.start(&AudioConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::Device(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(factory.created(), 1);
    assert_eq!(factory.live(), 0);
}

#[test]
fn test_device_start_failure_closes_stream() {
    let (mut session, backend, factory, _) = session();
    backend.device.fail_start.store(true, Ordering::SeqCst);

    assert!(session.start(&AudioConfig::default()).is_err());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(factory.live(), 0);
    assert!(!backend.device.has_stream());

    // A later attempt can still succeed
    backend.device.fail_start.store(false, Ordering::SeqCst);
    session.start(&AudioConfig::default()).unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(factory.live(), 1);
}

#[test]
fn test_stop_releases_model_after_device() {
    let (mut session, backend, factory, events) = session();
    session.start(&AudioConfig::default()).unwrap();
    session.stop();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(factory.live(), 0);
    assert!(!backend.device.has_stream());

    let stopped = events.position("stream stopped").unwrap();
    let dropped = events.position("model dropped").unwrap();
    assert!(stopped < dropped, "events: {:?}", events.snapshot());

    // No callback runs once stopped
    let mut output = vec![0i16; 960];
    assert!(!backend.device.run_duplex(&mut output, Some(&stereo_block(1, 480)), 480));

    // Stopping twice is harmless
    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_restart_gets_fresh_model() {
    let (mut session, backend, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();

    let mut output = vec![0i16; 960];
    backend.device.run_duplex(&mut output, Some(&stereo_block(500, 480)), 480);
    session.stop();

    session.start(&AudioConfig::default()).unwrap();
    assert_eq!(factory.created(), 2);
    assert_eq!(factory.live(), 1);

    // New model warms up again
    backend.device.run_duplex(&mut output, Some(&stereo_block(500, 480)), 480);
    assert!(output.iter().all(|&s| s == 0));
}

#[test]
fn test_start_while_running_rejected() {
    let (mut session, _, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();

    let err = session.start(&AudioConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            state: SessionState::Running,
            ..
        }
    ));
    assert_eq!(factory.created(), 1);
}

#[test]
fn test_stream_fault_moves_to_failed() {
    let (mut session, backend, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();
    assert_eq!(session.poll(), SessionState::Running);

    backend.device.raise_fault();
    assert_eq!(session.poll(), SessionState::Failed);
    assert!(session.last_error().is_some());

    // Processing is off while failed
    let mut output = vec![3i16; 960];
    backend.device.run_duplex(&mut output, Some(&stereo_block(1000, 480)), 480);
    assert!(output.iter().all(|&s| s == 0));

    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(factory.live(), 0);
}

#[test]
fn test_missing_input_plays_silence() {
    let (mut session, backend, _, _) = session();
    session.start(&AudioConfig::default()).unwrap();

    let mut output = vec![9i16; 960];
    assert!(backend.device.run_duplex(&mut output, None, 480));
    assert!(output.iter().all(|&s| s == 0));
}

#[test]
fn test_mode_toggle_while_running() {
    let (mut session, backend, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();
    let input = stereo_block(2000, 480);
    let mut output = vec![0i16; 960];

    session.set_filter_mode(FilterMode::Bypass);
    assert_eq!(session.filter_mode(), FilterMode::Bypass);
    backend.device.run_duplex(&mut output, Some(&input), 480);
    assert!(output.iter().all(|&s| s == 3000));
    assert_eq!(factory.calls(), 0);

    session.set_filter_mode(FilterMode::Suppress);
    backend.device.run_duplex(&mut output, Some(&input), 480);
    assert!(output.iter().all(|&s| s == 0), "warm-up frame after toggle");
    assert_eq!(factory.calls(), 1);
}

#[test]
fn test_drop_stops_session() {
    let (mut session, backend, factory, _) = session();
    session.start(&AudioConfig::default()).unwrap();
    drop(session);
    assert_eq!(factory.live(), 0);
    assert!(!backend.device.has_stream());
}

#[test]
fn test_device_config_forwarded() {
    let (mut session, backend, _, _) = session();
    let config = AudioConfig {
        capture_channels: 1,
        playback_channels: 2,
        input_device: Some("Mic".to_string()),
        ..AudioConfig::default()
    };
    session.start(&config).unwrap();

    let opened = backend.device.last_config.lock().unwrap().clone().unwrap();
    assert_eq!(opened.capture_channels, 1);
    assert_eq!(opened.input_device.as_deref(), Some("Mic"));
    assert_eq!(opened.sample_rate, 48000);

    // Mono capture passes through unchanged
    let mut output = vec![0i16; 960];
    backend.device.run_duplex(&mut output, Some(&vec![1234i16; 480]), 480);
    backend.device.run_duplex(&mut output, Some(&vec![1234i16; 480]), 480);
    assert!(output.iter().all(|&s| s == 1234));
}
