use crate::domain::analysis::PricePoint;
use chrono::{Duration, NaiveDate};
use rand::Rng;

/// Fixed reference price all scenario paths are anchored to.
pub const BASELINE_PRICE: f64 = 100.0;

/// Length of a synthesized path: the event date plus 29 following days.
pub const PATH_POINTS: usize = 30;

const JITTER: f64 = 0.02;

/// Back-fills a scenario price path the model omitted: a linear walk from
/// the baseline to the target over consecutive calendar days starting at the
/// event date, with small multiplicative noise so charts don't render as a
/// straight line. Prices are rounded to cents and floored at one cent.
pub fn synthesize(event_date: NaiveDate, target_price: f64) -> Vec<PricePoint> {
    let mut rng = rand::thread_rng();
    let mut path = Vec::with_capacity(PATH_POINTS);

    for i in 0..PATH_POINTS {
        let progress = i as f64 / (PATH_POINTS - 1) as f64;
        let price = BASELINE_PRICE + (target_price - BASELINE_PRICE) * progress;
        let noise = 1.0 + (rng.gen::<f64>() - 0.5) * JITTER;
        let price = ((price * noise).max(0.01) * 100.0).round() / 100.0;

        path.push(PricePoint {
            date: event_date + Duration::days(i as i64),
            price,
        });
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    #[test]
    fn path_has_fixed_length_and_consecutive_days() {
        let path = synthesize(start(), 150.0);
        assert_eq!(path.len(), PATH_POINTS);
        for (i, point) in path.iter().enumerate() {
            assert_eq!(point.date, start() + Duration::days(i as i64));
        }
    }

    #[test]
    fn path_endpoints_track_baseline_and_target() {
        for target in [150.0, 110.0, 80.0, 12.5] {
            let path = synthesize(start(), target);
            let first = path.first().unwrap().price;
            let last = path.last().unwrap().price;
            assert!(
                (first - BASELINE_PRICE).abs() <= BASELINE_PRICE * 0.03,
                "first point {first} too far from baseline"
            );
            assert!(
                (last - target).abs() <= target * 0.03,
                "last point {last} too far from target {target}"
            );
        }
    }

    #[test]
    fn prices_stay_positive() {
        let path = synthesize(start(), 0.05);
        assert!(path.iter().all(|p| p.price > 0.0));
    }
}
