//! Inertial sample aggregation
//!
//! Gyroscope and accelerometer deliver at their own hardware rates and are
//! not aligned with each other. The aggregator keeps the latest reading of
//! each and resamples the pair onto the shared wall clock at a fixed tick
//! rate, emitting one fused sample per tick.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{Clock, TimestampGuard};
use crate::lock_unpoisoned;
use crate::record::{AccelReading, GyroReading, InertialSample};
use crate::storage::RecordSink;

/// Inertial capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InertialConfig {
    /// Period of the aggregator tick
    pub tick_interval: Duration,
    /// Delivery rate requested from the motion source
    pub sensor_rate_hz: u32,
}

impl Default for InertialConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5), // 200 Hz
            sensor_rate_hz: 200,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Slots {
    gyro: Option<GyroReading>,
    accel: Option<AccelReading>,
}

/// Most recent gyro and accel readings.
///
/// Both slots sit behind one lock so a reader always sees a pair written by
/// complete deliveries, never half of an update.
#[derive(Debug, Default)]
pub struct LatestSensorState {
    slots: Mutex<Slots>,
}

impl LatestSensorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the gyro slot
    pub fn set_gyro(&self, reading: GyroReading) {
        lock_unpoisoned(&self.slots).gyro = Some(reading);
    }

    /// Overwrite the accel slot
    pub fn set_accel(&self, reading: AccelReading) {
        lock_unpoisoned(&self.slots).accel = Some(reading);
    }

    /// Read both slots without clearing them; `None` until both have a value
    pub fn pair(&self) -> Option<(GyroReading, AccelReading)> {
        let slots = *lock_unpoisoned(&self.slots);
        Some((slots.gyro?, slots.accel?))
    }
}

/// Fuses the latest sensor readings into one sample per tick
pub struct InertialAggregator {
    state: LatestSensorState,
    clock: Arc<dyn Clock>,
    stamps: TimestampGuard,
    sink: Arc<dyn RecordSink>,
    ticks: Mutex<TickCounters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct TickCounters {
    emitted: u64,
    skipped: u64,
}

impl InertialAggregator {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            state: LatestSensorState::new(),
            clock,
            stamps: TimestampGuard::new(),
            sink,
            ticks: Mutex::new(TickCounters::default()),
        }
    }

    /// New gyroscope delivery; replaces the previous one
    pub fn on_gyro(&self, reading: GyroReading) {
        self.state.set_gyro(reading);
    }

    /// New accelerometer delivery; replaces the previous one
    pub fn on_accel(&self, reading: AccelReading) {
        self.state.set_accel(reading);
    }

    /// Emit one sample from the current pair.
    ///
    /// Does nothing until both sensors have delivered at least once. The
    /// emitted sample is also returned.
    pub fn tick(&self) -> Option<InertialSample> {
        let Some((gyro, accel)) = self.state.pair() else {
            let mut ticks = lock_unpoisoned(&self.ticks);
            if ticks.skipped == 0 {
                debug!("IMU tick before both sensors reported, skipping");
            }
            ticks.skipped += 1;
            return None;
        };

        let timestamp_ns = self.stamps.stamp(self.clock.now_ns());
        let sample = InertialSample::from_readings(timestamp_ns, gyro, accel);
        self.sink.store_inertial(&sample);

        let mut ticks = lock_unpoisoned(&self.ticks);
        if ticks.emitted == 0 {
            info!("First IMU sample at {}", timestamp_ns);
        }
        ticks.emitted += 1;
        Some(sample)
    }

    /// Ticks that produced a sample
    pub fn samples_emitted(&self) -> u64 {
        lock_unpoisoned(&self.ticks).emitted
    }

    /// Ticks skipped because a sensor had not reported yet
    pub fn ticks_skipped(&self) -> u64 {
        lock_unpoisoned(&self.ticks).skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::testing::CollectingSink;

    fn aggregator(start_ns: i64) -> (InertialAggregator, Arc<ManualClock>, Arc<CollectingSink>) {
        let clock = Arc::new(ManualClock::new(start_ns));
        let sink = Arc::new(CollectingSink::default());
        let agg = InertialAggregator::new(clock.clone(), sink.clone());
        (agg, clock, sink)
    }

    #[test]
    fn tick_with_both_readings_emits_fused_sample() {
        let (agg, _clock, sink) = aggregator(1000);
        agg.on_gyro(GyroReading::new(1.0, 2.0, 3.0));
        agg.on_accel(AccelReading::new(4.0, 5.0, 6.0));

        let sample = agg.tick().unwrap();
        assert_eq!(sample.timestamp_ns, 1000);
        assert_eq!(sample.gyro, [1.0, 2.0, 3.0]);
        assert_eq!(sample.accel, [4.0 * -9.81, 5.0 * -9.81, 6.0 * -9.81]);
        assert_eq!(sink.inertial(), vec![sample]);
        assert_eq!(sample.to_csv_row(), "1000,1,2,3,-39.24,-49.05,-58.86\r\n");
    }

    #[test]
    fn tick_before_accel_emits_nothing() {
        let (agg, _clock, sink) = aggregator(1);
        agg.on_gyro(GyroReading::new(1.0, 0.0, 0.0));

        assert!(agg.tick().is_none());
        assert!(sink.inertial().is_empty());
        assert_eq!(agg.ticks_skipped(), 1);
    }

    #[test]
    fn tick_before_any_reading_emits_nothing() {
        let (agg, _clock, sink) = aggregator(1);
        assert!(agg.tick().is_none());
        agg.on_accel(AccelReading::new(0.0, 0.0, -1.0));
        assert!(agg.tick().is_none());
        assert!(sink.inertial().is_empty());
    }

    #[test]
    fn emits_iff_both_slots_seen_before_tick() {
        // Every interleaving of gyro (g), accel (a) and tick (t) up to length 6
        let ops = ['g', 'a', 't'];
        let mut sequences: Vec<Vec<char>> = vec![vec![]];
        for _ in 0..6 {
            sequences = sequences
                .into_iter()
                .flat_map(|seq| {
                    ops.iter().map(move |&op| {
                        let mut next = seq.clone();
                        next.push(op);
                        next
                    })
                })
                .collect();
        }

        for seq in sequences {
            let (agg, clock, sink) = aggregator(0);
            let (mut seen_g, mut seen_a) = (false, false);
            let mut expected = 0;
            for (i, op) in seq.iter().enumerate() {
                clock.set(i as i64 * 5_000_000);
                match op {
                    'g' => {
                        agg.on_gyro(GyroReading::new(i as f64, 0.0, 0.0));
                        seen_g = true;
                    }
                    'a' => {
                        agg.on_accel(AccelReading::new(i as f64, 0.0, 0.0));
                        seen_a = true;
                    }
                    _ => {
                        let emitted = agg.tick().is_some();
                        assert_eq!(emitted, seen_g && seen_a, "sequence {:?}", seq);
                        if emitted {
                            expected += 1;
                        }
                    }
                }
            }
            assert_eq!(sink.inertial().len(), expected);
        }
    }

    #[test]
    fn last_write_wins_and_slots_are_not_cleared() {
        let (agg, clock, sink) = aggregator(10);
        agg.on_gyro(GyroReading::new(1.0, 1.0, 1.0));
        agg.on_gyro(GyroReading::new(2.0, 2.0, 2.0));
        agg.on_accel(AccelReading::new(0.0, 0.0, 1.0));

        agg.tick().unwrap();
        clock.set(20);
        agg.tick().unwrap();

        let samples = sink.inertial();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].gyro, [2.0, 2.0, 2.0]);
        assert_eq!(samples[1].gyro, [2.0, 2.0, 2.0]);
        assert_eq!(samples[1].timestamp_ns, 20);
        assert_eq!(agg.samples_emitted(), 2);
    }

    #[test]
    fn stalled_clock_still_yields_increasing_timestamps() {
        let (agg, _clock, sink) = aggregator(500);
        agg.on_gyro(GyroReading::default());
        agg.on_accel(AccelReading::default());
        agg.tick();
        agg.tick();
        let ts: Vec<i64> = sink.inertial().iter().map(|s| s.timestamp_ns).collect();
        assert_eq!(ts, vec![500, 501]);
    }

    #[test]
    fn concurrent_deliveries_never_tear_the_pair() {
        // Each delivery writes the same value to all three axes; a torn
        // read would show mismatched axes within one reading.
        let state = Arc::new(LatestSensorState::new());
        let writer = state.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..10_000 {
                let v = i as f64;
                writer.set_gyro(GyroReading::new(v, v, v));
                writer.set_accel(AccelReading::new(v, v, v));
            }
        });

        for _ in 0..10_000 {
            if let Some((g, a)) = state.pair() {
                assert!(g.x == g.y && g.y == g.z);
                assert!(a.x == a.y && a.y == a.z);
            }
        }
        handle.join().unwrap();
    }
}
