use super::*;

#[test]
fn canvas_requires_nonzero_dims() {
    assert!(Canvas::new(0, 10).is_err());
    assert!(Canvas::new(10, 0).is_err());
    let c = Canvas::new(4, 2).unwrap();
    assert_eq!(c.rgba8_byte_len(), 32);
    assert_eq!(c.size(), Size::new(4.0, 2.0));
}

#[test]
fn from_secs_rounds_to_nearest_tick() {
    assert_eq!(MediaTime::from_secs_f64(1.0).value(), 600);
    assert_eq!(MediaTime::from_secs_f64(1.2).value(), 720);
    assert_eq!(MediaTime::from_secs_f64(3.7).value(), 2220);
    assert_eq!(MediaTime::from_secs_f64(0.0), MediaTime::ZERO);
}

#[test]
fn ordering_compares_across_timescales() {
    let a = MediaTime::from_ticks(600);
    let b = MediaTime::new(30, 30).unwrap();
    assert_eq!(a.cmp(&b), std::cmp::Ordering::Equal);
    assert!(MediaTime::from_ticks(599) < b);
    assert!(MediaTime::from_ticks(601) > b);
}

#[test]
fn add_rescales_rhs() {
    let a = MediaTime::from_ticks(600);
    let b = MediaTime::new(15, 30).unwrap();
    assert_eq!((a + b).value(), 900);
    assert_eq!((a + b).timescale(), TIMESCALE);
}

#[test]
fn periods_of_counts_whole_periods() {
    let tenth = MediaTime::from_ticks(60);
    assert_eq!(MediaTime::from_ticks(2220).periods_of(tenth), 37);
    assert_eq!(MediaTime::from_ticks(1500).periods_of(tenth), 25);
    assert_eq!(MediaTime::from_ticks(59).periods_of(tenth), 0);
    assert_eq!(MediaTime::from_ticks(-600).periods_of(tenth), 0);
    assert_eq!(MediaTime::from_ticks(600).periods_of(MediaTime::ZERO), 0);

    // Periods at another timescale: 1/100 s
    let centi = MediaTime::new(1, 100).unwrap();
    assert_eq!(MediaTime::from_ticks(606).periods_of(centi), 101);
}

#[test]
fn rescale_round_trips_exact_values() {
    let t = MediaTime::from_ticks(1500).rescale(1000).unwrap();
    assert_eq!(t.value(), 2500);
    assert_eq!(t.rescale(TIMESCALE).unwrap().value(), 1500);
}

#[test]
fn zero_timescale_is_rejected() {
    assert!(matches!(
        MediaTime::new(5, 0),
        Err(EncodeError::TimingError(_))
    ));
    assert!(MediaTime::from_ticks(600).rescale(0).is_none());

    let err = serde_json::from_str::<MediaTime>(r#"{ "value": 5, "timescale": 0 }"#);
    assert!(err.is_err());
    let ok: MediaTime = serde_json::from_str(r#"{ "value": 15, "timescale": 30 }"#).unwrap();
    assert_eq!(ok, MediaTime::from_ticks(300));
}
