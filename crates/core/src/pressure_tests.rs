use super::*;

#[test]
fn ewma_observe_moves_toward_sample() {
    let mut ewma = Ewma::new(0.5);
    ewma.observe(1.0);
    assert_eq!(ewma.value(), 0.5);
    ewma.observe(1.0);
    assert_eq!(ewma.value(), 0.75);
}

#[test]
fn ewma_decay_relaxes_toward_zero() {
    let mut ewma = Ewma::new(0.5);
    ewma.observe(1.0);
    let before = ewma.value();
    ewma.decay(1.0);
    assert!(ewma.value() < before);
    assert!(ewma.value() > 0.0);
}

#[test]
fn ewma_decay_many_periods_approaches_zero() {
    let mut ewma = Ewma::new(0.5);
    ewma.observe(1.0);
    ewma.decay(50.0);
    assert!(ewma.value() < 1e-9);
}

#[test]
fn failure_pressure_normalizes_to_pool_size() {
    let mut pressure = FailurePressure::new(1.0, 2);
    pressure.observe_death();
    assert_eq!(pressure.value(), 0.5);
}

#[test]
fn failure_pressure_exceeds_threshold_after_successive_deaths() {
    let mut pressure = FailurePressure::new(0.8, 2);
    pressure.observe_death();
    pressure.observe_death();
    pressure.observe_death();
    assert!(pressure.exceeds(0.5));
}

#[test]
fn failure_pressure_decays_without_new_deaths() {
    let mut pressure = FailurePressure::new(0.8, 2);
    pressure.observe_death();
    let before = pressure.value();
    pressure.decay(3.0);
    assert!(pressure.value() < before);
}

#[test]
fn request_pressure_tracks_queue_depth() {
    let mut pressure = RequestPressure::new(4);
    assert_eq!(pressure.value(), 0.0);
    pressure.on_enqueue();
    pressure.on_enqueue();
    assert_eq!(pressure.value(), 0.5);
    assert_eq!(pressure.depth(), 2);
    pressure.on_dequeue();
    assert_eq!(pressure.depth(), 1);
}

#[test]
fn request_pressure_is_full_at_capacity() {
    let mut pressure = RequestPressure::new(2);
    assert!(!pressure.is_full());
    pressure.on_enqueue();
    pressure.on_enqueue();
    assert!(pressure.is_full());
}

#[test]
fn request_pressure_dequeue_does_not_underflow() {
    let mut pressure = RequestPressure::new(2);
    pressure.on_dequeue();
    assert_eq!(pressure.depth(), 0);
}
