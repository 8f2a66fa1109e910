//! Random-walk flight paths for emulated drones

use fleetgeo_shared::PositionReport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Longitude range the walk stays inside
pub const LONGITUDE_RANGE: (f64, f64) = (1.0, 179.0);
/// Latitude range the walk stays inside
pub const LATITUDE_RANGE: (f64, f64) = (1.0, 89.0);

/// Largest per-step move in degrees
const MAX_STEP_DEG: f64 = 0.0005;

/// Seven decimal places, roughly 1 cm
const PRECISION: f64 = 1e7;

/// Flight parameters shared by every emulated drone
#[derive(Debug, Clone, Copy)]
pub struct FlightParams {
    pub origin: PositionReport,
    /// Probability of repeating the last position
    pub hover_probability: f64,
}

/// Seeded random walk starting near an origin
///
/// Hovering repeats the previous report verbatim so the server sees a
/// no-op and leaves the drone's timestamp untouched.
pub struct FlightPath {
    rng: StdRng,
    position: PositionReport,
    hover_probability: f64,
}

impl FlightPath {
    pub fn new(params: FlightParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = PositionReport::new(
            params.origin.longitude + rng.gen_range(-0.01..=0.01),
            params.origin.latitude + rng.gen_range(-0.01..=0.01),
        );

        Self {
            rng,
            position: clamp(start),
            hover_probability: params.hover_probability.clamp(0.0, 1.0),
        }
    }

    pub fn position(&self) -> PositionReport {
        self.position
    }

    /// Advance one step and return the new report
    pub fn next_report(&mut self) -> PositionReport {
        if self.rng.gen_bool(self.hover_probability) {
            return self.position;
        }

        let step = PositionReport::new(
            self.position.longitude + self.rng.gen_range(-MAX_STEP_DEG..=MAX_STEP_DEG),
            self.position.latitude + self.rng.gen_range(-MAX_STEP_DEG..=MAX_STEP_DEG),
        );
        self.position = clamp(step);
        self.position
    }
}

fn clamp(report: PositionReport) -> PositionReport {
    PositionReport::new(
        round(report.longitude.clamp(LONGITUDE_RANGE.0, LONGITUDE_RANGE.1)),
        round(report.latitude.clamp(LATITUDE_RANGE.0, LATITUDE_RANGE.1)),
    )
}

fn round(deg: f64) -> f64 {
    (deg * PRECISION).round() / PRECISION
}
