//! Demand forecaster
//!
//! Per-hour cover forecasts from weighted historical averages:
//!
//! 1. bucket covers by (day-of-week, hour) over the last 8 weeks
//! 2. weight week `w` weeks ago by `0.85^w`; the weighted mean is baseline
//! 3. linear trend over weekly totals, applied as a multiplicative
//!    correction capped at ±20%
//! 4. confidence band = baseline ± 1 weighted std-dev (min 10%)
//!
//! Evaluation: daily MAPE with `max(actual, 1)` denominators, rating
//! thresholds, and an improving/stable/declining accuracy trend.

use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use shared::{AppError, AppResult};
use sqlx::SqlitePool;

use crate::db::repository::{restaurant, visit};
use crate::utils::time::{
    day_start_millis_tz, millis_to_date_hour_tz, parse_timezone, week_start,
};

/// Lookback horizon in weeks
pub const DEFAULT_LOOKBACK_WEEKS: u64 = 8;
/// Exponential decay per week of age
pub const DECAY_FACTOR: f64 = 0.85;
/// Trend correction cap (±20%)
pub const TREND_CAP_PCT: f64 = 20.0;
/// Confidence band floor as a fraction of the prediction
pub const MIN_BAND_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTrendDirection {
    Improving,
    Stable,
    Declining,
}

/// Predicted demand for one hour of one weekday
#[derive(Debug, Clone, Serialize)]
pub struct HourlyForecast {
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub hour: u32,
    pub predicted_covers: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    /// Applied trend correction in percent
    pub trend_adjustment: f64,
}

/// Predicted demand for a full day
#[derive(Debug, Clone, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub day_of_week: u32,
    pub total_predicted_covers: f64,
    pub peak_hour: u32,
    pub hourly: Vec<HourlyForecast>,
}

/// Predicted demand for a full week
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyForecast {
    pub restaurant_id: String,
    pub week_start: NaiveDate,
    pub overall_trend: TrendLabel,
    pub trend_pct: f64,
    pub total_predicted_covers: f64,
    pub daily: Vec<DailyForecast>,
}

impl WeeklyForecast {
    pub fn day(&self, date: NaiveDate) -> Option<&DailyForecast> {
        self.daily.iter().find(|d| d.date == date)
    }
}

/// Forecast vs actual for one day
#[derive(Debug, Clone, Serialize)]
pub struct DailyAccuracy {
    pub date: NaiveDate,
    pub predicted_covers: f64,
    pub actual_covers: i64,
    pub absolute_error: f64,
    /// Percent, `|pred − actual| / max(actual, 1) · 100`
    pub percentage_error: f64,
}

/// Forecast vs actual for a week
#[derive(Debug, Clone, Serialize)]
pub struct ForecastAccuracy {
    pub restaurant_id: String,
    pub week_start: NaiveDate,
    /// Percent; lower is better
    pub mape: f64,
    pub mape_rating: AccuracyRating,
    pub total_predicted_covers: f64,
    pub total_actual_covers: i64,
    pub variance_pct: f64,
    pub daily: Vec<DailyAccuracy>,
}

/// Historical accuracy direction over several weeks
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyTrend {
    pub restaurant_id: String,
    pub avg_mape: f64,
    pub direction: AccuracyTrendDirection,
    pub weeks: Vec<ForecastAccuracy>,
}

/// Historical sample: covers seen `weeks_ago` weeks before the reference,
/// in a (day-of-week, hour) bucket
#[derive(Debug, Clone, Copy)]
struct Sample {
    weeks_ago: u64,
    day_of_week: u32,
    hour: u32,
    covers: i64,
}

/// Weighted mean and std-dev per (day_of_week, hour) bucket
fn weighted_stats(samples: &[Sample]) -> HashMap<(u32, u32), (f64, f64)> {
    let mut sums: HashMap<(u32, u32), (f64, f64)> = HashMap::new();
    for s in samples {
        let weight = DECAY_FACTOR.powi(s.weeks_ago as i32);
        let entry = sums.entry((s.day_of_week, s.hour)).or_insert((0.0, 0.0));
        entry.0 += s.covers as f64 * weight;
        entry.1 += weight;
    }

    let means: HashMap<(u32, u32), f64> = sums
        .iter()
        .map(|(k, (wsum, wtotal))| (*k, if *wtotal > 0.0 { wsum / wtotal } else { 0.0 }))
        .collect();

    // Weighted variance around the weighted mean
    let mut var_sums: HashMap<(u32, u32), (f64, f64)> = HashMap::new();
    for s in samples {
        let weight = DECAY_FACTOR.powi(s.weeks_ago as i32);
        let mean = means[&(s.day_of_week, s.hour)];
        let entry = var_sums.entry((s.day_of_week, s.hour)).or_insert((0.0, 0.0));
        entry.0 += weight * (s.covers as f64 - mean).powi(2);
        entry.1 += weight;
    }

    means
        .into_iter()
        .map(|(k, mean)| {
            let std = var_sums
                .get(&k)
                .map(|(vsum, wtotal)| if *wtotal > 0.0 { (vsum / wtotal).sqrt() } else { 0.0 })
                .unwrap_or(0.0);
            (k, (mean, std))
        })
        .collect()
}

/// Linear-regression trend over weekly totals, sign-corrected so positive
/// means demand is growing, capped at ±20%.
fn trend(samples: &[Sample]) -> (f64, TrendLabel) {
    let mut weekly_totals: HashMap<u64, i64> = HashMap::new();
    for s in samples {
        *weekly_totals.entry(s.weeks_ago).or_insert(0) += s.covers;
    }
    if weekly_totals.len() < 2 {
        return (0.0, TrendLabel::Stable);
    }

    let weeks: Vec<u64> = {
        let mut w: Vec<u64> = weekly_totals.keys().copied().collect();
        w.sort_unstable();
        w
    };
    let n = weeks.len() as f64;
    let sum_x: f64 = weeks.iter().map(|w| *w as f64).sum();
    let sum_y: f64 = weeks.iter().map(|w| weekly_totals[w] as f64).sum();
    let sum_xy: f64 = weeks.iter().map(|w| *w as f64 * weekly_totals[w] as f64).sum();
    let sum_x2: f64 = weeks.iter().map(|w| (*w as f64).powi(2)).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return (0.0, TrendLabel::Stable);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;

    let avg = (sum_y / n).max(1.0);
    // x counts weeks *ago*: a negative slope means demand grows toward now
    let mut trend_pct = -(slope / avg) * 100.0;
    trend_pct = trend_pct.clamp(-TREND_CAP_PCT, TREND_CAP_PCT);

    let label = if trend_pct > 3.0 {
        TrendLabel::Increasing
    } else if trend_pct < -3.0 {
        TrendLabel::Decreasing
    } else {
        TrendLabel::Stable
    };
    (trend_pct, label)
}

fn rate_mape(mape: f64) -> AccuracyRating {
    if mape < 10.0 {
        AccuracyRating::Excellent
    } else if mape < 20.0 {
        AccuracyRating::Good
    } else if mape < 30.0 {
        AccuracyRating::Fair
    } else {
        AccuracyRating::Poor
    }
}

/// Daily percentage error per the evaluation formula:
/// `|predicted − actual| / max(actual, 1)`, in percent.
fn percentage_error(predicted: f64, actual: i64) -> f64 {
    (predicted - actual as f64).abs() / (actual.max(1) as f64) * 100.0
}

pub struct DemandForecaster {
    pool: SqlitePool,
}

impl DemandForecaster {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The restaurant's business timezone; day and hour buckets follow it
    async fn timezone(&self, restaurant_id: &str) -> AppResult<Tz> {
        let r = restaurant::get(&self.pool, restaurant_id).await.map_err(AppError::from)?;
        Ok(parse_timezone(&r.timezone))
    }

    /// Historical samples for the `lookback` weeks before `reference`
    /// (reference itself excluded).
    async fn load_samples(
        &self,
        restaurant_id: &str,
        reference: NaiveDate,
        lookback: u64,
        tz: Tz,
    ) -> AppResult<Vec<Sample>> {
        let start = reference - Days::new(lookback * 7);
        let start_millis = day_start_millis_tz(start, tz);
        let end_millis = day_start_millis_tz(reference, tz);
        let visits = visit::find_seated_in_range(&self.pool, restaurant_id, start_millis, end_millis)
            .await
            .map_err(AppError::from)?;

        let mut samples = Vec::with_capacity(visits.len());
        for v in visits {
            let (date, hour) = millis_to_date_hour_tz(v.seated_at, tz);
            if date >= reference || date < start {
                continue;
            }
            let weeks_ago = ((reference - date).num_days() as u64).div_ceil(7).max(1) - 1;
            samples.push(Sample {
                weeks_ago,
                day_of_week: date.weekday().num_days_from_monday(),
                hour,
                covers: v.party_size,
            });
        }
        Ok(samples)
    }

    /// Hourly forecast for the week starting at `week_start` (Monday).
    pub async fn forecast_week(
        &self,
        restaurant_id: &str,
        target_week: NaiveDate,
    ) -> AppResult<WeeklyForecast> {
        let target_week = week_start(target_week);
        let tz = self.timezone(restaurant_id).await?;
        let samples = self
            .load_samples(restaurant_id, target_week, DEFAULT_LOOKBACK_WEEKS, tz)
            .await?;

        let stats = weighted_stats(&samples);
        let (trend_pct, trend_label) = trend(&samples);

        let mut daily = Vec::with_capacity(7);
        let mut total = 0.0;

        for day_offset in 0..7u64 {
            let date = target_week + Days::new(day_offset);
            let dow = date.weekday().num_days_from_monday();

            let mut hourly = Vec::with_capacity(24);
            let mut day_total = 0.0;
            let mut peak_hour = 0;
            let mut peak_covers = f64::NEG_INFINITY;

            for hour in 0..24u32 {
                let (baseline, std) = stats.get(&(dow, hour)).copied().unwrap_or((0.0, 0.0));
                let adjusted = baseline * (1.0 + trend_pct / 100.0);
                let band = std.max(adjusted * MIN_BAND_FRACTION);

                if adjusted > peak_covers {
                    peak_covers = adjusted;
                    peak_hour = hour;
                }
                day_total += adjusted;

                hourly.push(HourlyForecast {
                    day_of_week: dow,
                    hour,
                    predicted_covers: adjusted,
                    confidence_low: (adjusted - band).max(0.0),
                    confidence_high: adjusted + band,
                    trend_adjustment: trend_pct,
                });
            }

            total += day_total;
            daily.push(DailyForecast {
                date,
                day_of_week: dow,
                total_predicted_covers: day_total,
                peak_hour,
                hourly,
            });
        }

        Ok(WeeklyForecast {
            restaurant_id: restaurant_id.to_string(),
            week_start: target_week,
            overall_trend: trend_label,
            trend_pct,
            total_predicted_covers: total,
            daily,
        })
    }

    /// Busiest hours for one weekday, by weighted average covers.
    pub async fn peak_hours(
        &self,
        restaurant_id: &str,
        day_of_week: u32,
        reference: NaiveDate,
    ) -> AppResult<Vec<(u32, f64)>> {
        let tz = self.timezone(restaurant_id).await?;
        let samples = self
            .load_samples(restaurant_id, week_start(reference), DEFAULT_LOOKBACK_WEEKS, tz)
            .await?;
        let stats = weighted_stats(&samples);

        let mut hours: Vec<(u32, f64)> = stats
            .into_iter()
            .filter(|((dow, _), _)| *dow == day_of_week)
            .map(|((_, hour), (mean, _))| (hour, mean))
            .collect();
        hours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hours)
    }

    /// MAPE comparison of what would have been forecast against actuals.
    pub async fn compare_forecast_to_actual(
        &self,
        restaurant_id: &str,
        target_week: NaiveDate,
    ) -> AppResult<ForecastAccuracy> {
        let target_week = week_start(target_week);
        let tz = self.timezone(restaurant_id).await?;
        let forecast = self.forecast_week(restaurant_id, target_week).await?;

        // Actual covers by business day for the target week
        let start_millis = day_start_millis_tz(target_week, tz);
        let end_millis = day_start_millis_tz(target_week + Days::new(7), tz);
        let visits = visit::find_seated_in_range(&self.pool, restaurant_id, start_millis, end_millis)
            .await
            .map_err(AppError::from)?;
        let mut actual_by_day: HashMap<NaiveDate, i64> = HashMap::new();
        for v in visits {
            let (date, _) = millis_to_date_hour_tz(v.seated_at, tz);
            *actual_by_day.entry(date).or_insert(0) += v.party_size;
        }

        let mut daily = Vec::with_capacity(7);
        let mut total_predicted = 0.0;
        let mut total_actual = 0i64;
        let mut error_sum = 0.0;

        for day in &forecast.daily {
            let actual = actual_by_day.get(&day.date).copied().unwrap_or(0);
            let predicted = day.total_predicted_covers;
            let error_pct = percentage_error(predicted, actual);

            total_predicted += predicted;
            total_actual += actual;
            error_sum += error_pct;

            daily.push(DailyAccuracy {
                date: day.date,
                predicted_covers: predicted,
                actual_covers: actual,
                absolute_error: (predicted - actual as f64).abs(),
                percentage_error: error_pct,
            });
        }

        let mape = error_sum / daily.len().max(1) as f64;
        let variance_pct = if total_actual > 0 {
            (total_predicted - total_actual as f64) / total_actual as f64 * 100.0
        } else if total_predicted > 0.0 {
            100.0
        } else {
            0.0
        };

        Ok(ForecastAccuracy {
            restaurant_id: restaurant_id.to_string(),
            week_start: target_week,
            mape,
            mape_rating: rate_mape(mape),
            total_predicted_covers: total_predicted,
            total_actual_covers: total_actual,
            variance_pct,
            daily,
        })
    }

    /// Accuracy over the last `weeks` completed weeks before `reference`.
    pub async fn accuracy_trend(
        &self,
        restaurant_id: &str,
        reference: NaiveDate,
        weeks: u64,
    ) -> AppResult<AccuracyTrend> {
        let current_week = week_start(reference);

        let mut accuracies = Vec::new();
        for offset in (1..=weeks).rev() {
            let target = current_week - Days::new(offset * 7);
            let accuracy = self.compare_forecast_to_actual(restaurant_id, target).await?;
            if accuracy.total_actual_covers > 0 {
                accuracies.push(accuracy);
            }
        }

        if accuracies.is_empty() {
            return Ok(AccuracyTrend {
                restaurant_id: restaurant_id.to_string(),
                avg_mape: 0.0,
                direction: AccuracyTrendDirection::Stable,
                weeks: accuracies,
            });
        }

        let mapes: Vec<f64> = accuracies.iter().map(|a| a.mape).collect();
        let avg_mape = mapes.iter().sum::<f64>() / mapes.len() as f64;

        let direction = if mapes.len() >= 3 {
            let mid = mapes.len() / 2;
            let first = mapes[..mid].iter().sum::<f64>() / mid as f64;
            let second = mapes[mid..].iter().sum::<f64>() / (mapes.len() - mid) as f64;
            // Lower MAPE later means the forecasts are getting better
            if second - first < -3.0 {
                AccuracyTrendDirection::Improving
            } else if second - first > 3.0 {
                AccuracyTrendDirection::Declining
            } else {
                AccuracyTrendDirection::Stable
            }
        } else {
            AccuracyTrendDirection::Stable
        };

        Ok(AccuracyTrend {
            restaurant_id: restaurant_id.to_string(),
            avg_mape,
            direction,
            weeks: accuracies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_stats_prefer_recent_weeks() {
        // Same bucket, 40 covers last week vs 10 covers 7 weeks ago
        let samples = vec![
            Sample { weeks_ago: 0, day_of_week: 4, hour: 19, covers: 40 },
            Sample { weeks_ago: 7, day_of_week: 4, hour: 19, covers: 10 },
        ];
        let stats = weighted_stats(&samples);
        let (mean, _) = stats[&(4, 19)];
        // Weighted mean must sit well above the midpoint of 25
        assert!(mean > 30.0, "weighted mean {mean} should lean to the recent 40");
    }

    #[test]
    fn trend_detects_growth_and_caps_at_twenty_percent() {
        // Steep steady growth toward the present: 50 covers/week slope on a
        // 225-cover average works out to ~22%, which the cap trims to 20%
        let mut samples = Vec::new();
        for weeks_ago in 0..8u64 {
            samples.push(Sample {
                weeks_ago,
                day_of_week: 0,
                hour: 12,
                covers: 400 - (weeks_ago as i64) * 50,
            });
        }
        let (pct, label) = trend(&samples);
        assert_eq!(label, TrendLabel::Increasing);
        assert_eq!(pct, TREND_CAP_PCT);
    }

    #[test]
    fn flat_history_is_stable() {
        let samples: Vec<Sample> = (0..8u64)
            .map(|weeks_ago| Sample { weeks_ago, day_of_week: 2, hour: 18, covers: 50 })
            .collect();
        let (pct, label) = trend(&samples);
        assert_eq!(label, TrendLabel::Stable);
        assert!(pct.abs() < 1e-9);
    }

    #[test]
    fn spec_scenario_mape_is_excellent() {
        // actuals [55,60,50,70,120,180,200] vs forecasts [52,58,55,72,115,170,210]
        let actual = [55i64, 60, 50, 70, 120, 180, 200];
        let predicted = [52.0, 58.0, 55.0, 72.0, 115.0, 170.0, 210.0];

        let mape = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| percentage_error(*p, *a))
            .sum::<f64>()
            / actual.len() as f64;

        assert!((mape - 6.5).abs() < 0.5, "expected ≈6.5%, got {mape}");
        assert_eq!(rate_mape(mape), AccuracyRating::Excellent);
    }

    #[test]
    fn mape_ratings_follow_thresholds() {
        assert_eq!(rate_mape(9.9), AccuracyRating::Excellent);
        assert_eq!(rate_mape(10.0), AccuracyRating::Good);
        assert_eq!(rate_mape(19.9), AccuracyRating::Good);
        assert_eq!(rate_mape(29.9), AccuracyRating::Fair);
        assert_eq!(rate_mape(30.0), AccuracyRating::Poor);
    }

    #[test]
    fn zero_actual_uses_unit_denominator() {
        // MAPE is defined even when a day had no covers
        assert_eq!(percentage_error(3.0, 0), 300.0);
    }
}
