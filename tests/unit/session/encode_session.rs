use super::*;
use crate::assets::image::SourceImage;
use crate::encode::memory::{InMemoryEncoder, InMemoryEncoderOpts};
use crate::foundation::core::Canvas;
use crate::timeline::Frame;

fn solid(rgba: [u8; 4]) -> SourceImage {
    SourceImage::from_rgba8(image::RgbaImage::from_pixel(4, 2, image::Rgba(rgba))).unwrap()
}

fn settings() -> RenderSettings {
    RenderSettings::new(
        Canvas {
            width: 8,
            height: 8,
        },
        "clip",
    )
    .with_output_dir(std::env::temp_dir())
}

fn three_frames() -> Timeline {
    Timeline::build(&[
        Frame::new(solid([255, 0, 0, 255]), 1.0).unwrap(),
        Frame::new(solid([0, 255, 0, 255]), 1.5).unwrap(),
        Frame::new(solid([0, 0, 255, 255]), 1.2).unwrap(),
    ])
    .unwrap()
}

fn ticks(rec: &crate::encode::memory::Recording) -> Vec<i64> {
    rec.frames.iter().map(|f| f.presentation_time.value()).collect()
}

#[tokio::test]
async fn appends_each_entry_then_repeats_the_last() {
    let enc = InMemoryEncoder::default();
    let rec = enc.recording();
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();
    assert_eq!(session.state(), SessionState::Writing);

    let out = session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(out, settings().output_path());
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(session.stats().frames_appended, 4);

    let rec = rec.snapshot();
    assert_eq!(ticks(&rec), vec![0, 600, 1500, 2220]);
    assert_eq!(rec.end_time, Some(MediaTime::from_ticks(2220)));
    assert!(rec.marked_finished);
    assert!(rec.finished);
    assert_eq!(rec.frames[2].checksum, rec.frames[3].checksum);
    assert_ne!(rec.frames[0].checksum, rec.frames[1].checksum);
}

#[tokio::test]
async fn frame_period_divides_every_timestamp() {
    let enc = InMemoryEncoder::default();
    let rec = enc.recording();
    let timeline = Timeline::build(&[
        Frame::new(solid([1, 1, 1, 255]), 0.01).unwrap(),
        Frame::new(solid([2, 2, 2, 255]), 1.01).unwrap(),
    ])
    .unwrap();
    let mut session = EncodeSession::open(enc, &settings(), timeline).unwrap();
    session.run(&CancellationToken::new()).await.unwrap();

    let rec = rec.snapshot();
    let period = rec.settings.as_ref().unwrap().frame_duration;
    assert_eq!(period, MediaTime::from_ticks(6));
    assert_eq!(ticks(&rec), vec![0, 6, 612]);
    assert!(ticks(&rec).iter().all(|t| t % period.value() == 0));
}

#[tokio::test]
async fn single_frame_ends_at_its_duration() {
    let enc = InMemoryEncoder::default();
    let rec = enc.recording();
    let timeline = Timeline::build(&[Frame::new(solid([1, 2, 3, 255]), 2.0).unwrap()]).unwrap();
    let mut session = EncodeSession::open(enc, &settings(), timeline).unwrap();
    session.run(&CancellationToken::new()).await.unwrap();

    let rec = rec.snapshot();
    assert_eq!(ticks(&rec), vec![0, 1200]);
    assert_eq!(rec.end_time, Some(MediaTime::from_ticks(1200)));
}

#[test]
fn refused_output_settings_fail_as_invalid_writer() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        accept_output_settings: false,
        ..Default::default()
    });
    let mut session = EncodeSession::new(enc, &settings(), three_frames());
    assert_eq!(session.state(), SessionState::Idle);

    let err = session.start().unwrap_err();
    assert!(matches!(err, EncodeError::InvalidWriter(_)));
    assert_eq!(
        session.state(),
        SessionState::Failed(EncodeErrorKind::InvalidWriter)
    );
}

#[test]
fn refused_input_fails_open() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        accept_input: false,
        ..Default::default()
    });
    let rec = enc.recording();
    let err = EncodeSession::open(enc, &settings(), three_frames())
        .err()
        .unwrap();
    assert!(matches!(err, EncodeError::InvalidWriter(_)));
    assert!(rec.snapshot().settings.is_none());
}

#[test]
fn exhausted_pool_fails_the_session() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        max_buffers: 0,
        ..Default::default()
    });
    let rec = enc.recording();
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();

    let err = session.submit_next(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, EncodeError::PixelBufferUnavailable));
    assert_eq!(
        session.state(),
        SessionState::Failed(EncodeErrorKind::PixelBufferUnavailable)
    );
    assert!(rec.snapshot().frames.is_empty());
    assert!(matches!(
        session.submit_next(&CancellationToken::new()),
        Err(EncodeError::SessionClosed)
    ));
}

#[test]
fn busy_encoder_defers_without_consuming_the_frame() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        hold_permits: true,
        ..Default::default()
    });
    let rec = enc.recording();
    let cancel = CancellationToken::new();
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();

    assert!(session.is_ready_for_more_data());
    assert_eq!(
        session.submit_next(&cancel).unwrap(),
        Submission::Appended {
            presentation_time: MediaTime::ZERO,
            last: false
        }
    );
    assert!(!session.is_ready_for_more_data());
    assert_eq!(session.submit_next(&cancel).unwrap(), Submission::Deferred);
    assert_eq!(session.submit_next(&cancel).unwrap(), Submission::Deferred);
    assert_eq!(session.stats().deferrals, 2);
    assert_eq!(rec.snapshot().frames.len(), 1);

    assert!(rec.release_one());
    assert_eq!(
        session.submit_next(&cancel).unwrap(),
        Submission::Appended {
            presentation_time: MediaTime::from_ticks(600),
            last: false
        }
    );
}

#[tokio::test]
async fn drive_waits_for_released_capacity() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        hold_permits: true,
        ..Default::default()
    });
    let rec = enc.recording();
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();

    let releaser = {
        let rec = rec.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                while rec.held_permits() == 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                rec.release_one();
            }
        })
    };

    session.run(&CancellationToken::new()).await.unwrap();
    releaser.await.unwrap();
    assert_eq!(ticks(&rec.snapshot()), vec![0, 600, 1500, 2220]);
    assert!(session.stats().deferrals >= 1);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_append() {
    let enc = InMemoryEncoder::default();
    let rec = enc.recording();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();
    let err = session.run(&cancel).await.unwrap_err();
    assert!(matches!(err, EncodeError::Cancelled));
    assert_eq!(
        session.state(),
        SessionState::Failed(EncodeErrorKind::Cancelled)
    );
    assert!(rec.snapshot().frames.is_empty());
    assert!(!rec.snapshot().finished);
}

#[tokio::test]
async fn cancel_interrupts_waiting_for_readiness() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        hold_permits: true,
        ..Default::default()
    });
    let rec = enc.recording();
    let cancel = CancellationToken::new();
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };

    let err = session.run(&cancel).await.unwrap_err();
    trigger.await.unwrap();
    assert!(matches!(err, EncodeError::Cancelled));
    assert_eq!(rec.snapshot().frames.len(), 1);
}

#[tokio::test]
async fn finalize_failure_is_terminal() {
    let enc = InMemoryEncoder::new(InMemoryEncoderOpts {
        finish_error: Some("disk full".to_owned()),
        ..Default::default()
    });
    let mut session = EncodeSession::open(enc, &settings(), three_frames()).unwrap();

    let err = session.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EncodeError::Finalization(ref msg) if msg.contains("disk full")));
    assert_eq!(
        session.state(),
        SessionState::Failed(EncodeErrorKind::Finalization)
    );
}

#[tokio::test]
async fn terminal_session_rejects_further_calls() {
    let mut session =
        EncodeSession::open(InMemoryEncoder::default(), &settings(), three_frames()).unwrap();
    let cancel = CancellationToken::new();
    session.run(&cancel).await.unwrap();

    assert!(matches!(
        session.submit_next(&cancel),
        Err(EncodeError::SessionClosed)
    ));
    assert!(matches!(
        session.finish().await,
        Err(EncodeError::SessionClosed)
    ));
    assert!(matches!(session.start(), Err(EncodeError::SessionClosed)));
}

#[tokio::test]
async fn finish_before_exhaustion_is_a_timing_error() {
    let mut session =
        EncodeSession::open(InMemoryEncoder::default(), &settings(), three_frames()).unwrap();
    session.submit_next(&CancellationToken::new()).unwrap();

    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, EncodeError::TimingError(_)));
}
