//! Synthetic reading generators feeding the sample source.

use biochain_common::{BloodPressure, Reading, Timestamp};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Produces the reading for a given logical tick.
pub trait ReadingGenerator: Send {
    fn next_reading(&mut self, timestamp: Timestamp) -> Reading;
}

/// Uniformly random vitals. Every range stays inside the default alert thresholds.
#[derive(Debug)]
pub struct RandomVitals {
    rng: StdRng,
}

impl RandomVitals {
    pub const HEART_RATE: std::ops::RangeInclusive<u32> = 60..=180;
    pub const SYSTOLIC: std::ops::RangeInclusive<u32> = 110..=180;
    pub const DIASTOLIC: std::ops::RangeInclusive<u32> = 70..=110;
    pub const OXYGEN: std::ops::RangeInclusive<u32> = 90..=100;

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl ReadingGenerator for RandomVitals {
    fn next_reading(&mut self, timestamp: Timestamp) -> Reading {
        Reading {
            timestamp,
            heart_rate: self.rng.gen_range(Self::HEART_RATE),
            blood_pressure: BloodPressure {
                systolic: self.rng.gen_range(Self::SYSTOLIC),
                diastolic: self.rng.gen_range(Self::DIASTOLIC),
            },
            oxygen: self.rng.gen_range(Self::OXYGEN),
        }
    }
}

/// Replays a fixed list of readings, cycling when exhausted. Only the timestamp of
/// each template is replaced.
#[derive(Debug, Clone)]
pub struct ScriptedReadings {
    templates: Vec<Reading>,
    cursor: usize,
}

impl ScriptedReadings {
    pub fn new(templates: Vec<Reading>) -> Self {
        Self {
            templates,
            cursor: 0,
        }
    }

    /// Same vitals on every tick.
    pub fn constant(heart_rate: u32, systolic: u32, diastolic: u32, oxygen: u32) -> Self {
        Self::new(vec![Reading {
            timestamp: 0,
            heart_rate,
            blood_pressure: BloodPressure {
                systolic,
                diastolic,
            },
            oxygen,
        }])
    }
}

impl ReadingGenerator for ScriptedReadings {
    fn next_reading(&mut self, timestamp: Timestamp) -> Reading {
        let template = match self.templates.get(self.cursor) {
            Some(template) => *template,
            None => match self.templates.first() {
                Some(first) => {
                    self.cursor = 0;
                    *first
                }
                None => Reading {
                    timestamp,
                    heart_rate: 75,
                    blood_pressure: BloodPressure {
                        systolic: 120,
                        diastolic: 80,
                    },
                    oxygen: 98,
                },
            },
        };
        self.cursor += 1;
        Reading {
            timestamp,
            ..template
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_vitals_stay_in_range() {
        let mut generator = RandomVitals::new(Some(7));
        for timestamp in 0..500 {
            let reading = generator.next_reading(timestamp);
            assert_eq!(reading.timestamp, timestamp);
            assert!(RandomVitals::HEART_RATE.contains(&reading.heart_rate));
            assert!(RandomVitals::SYSTOLIC.contains(&reading.blood_pressure.systolic));
            assert!(RandomVitals::DIASTOLIC.contains(&reading.blood_pressure.diastolic));
            assert!(RandomVitals::OXYGEN.contains(&reading.oxygen));
        }
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let mut first = RandomVitals::new(Some(42));
        let mut second = RandomVitals::new(Some(42));
        for timestamp in 0..20 {
            assert_eq!(first.next_reading(timestamp), second.next_reading(timestamp));
        }
    }

    #[test]
    fn scripted_readings_cycle_and_restamp() {
        let mut generator = ScriptedReadings::new(vec![
            Reading {
                timestamp: 99,
                heart_rate: 70,
                blood_pressure: BloodPressure {
                    systolic: 120,
                    diastolic: 80,
                },
                oxygen: 97,
            },
            Reading {
                timestamp: 99,
                heart_rate: 210,
                blood_pressure: BloodPressure {
                    systolic: 120,
                    diastolic: 80,
                },
                oxygen: 97,
            },
        ]);

        let rates: Vec<(Timestamp, u32)> = (0..5)
            .map(|timestamp| {
                let reading = generator.next_reading(timestamp);
                (reading.timestamp, reading.heart_rate)
            })
            .collect();
        assert_eq!(rates, vec![(0, 70), (1, 210), (2, 70), (3, 210), (4, 70)]);
    }
}
