//! Reduction of a valuation series into report-ready summary statistics.

use crate::types::{CurveValuationSummary, PricePoint, ValuationSeries};

/// Reduce a series to launch / ATH / ATL / current plus percentage deltas.
///
/// Returns `None` for an empty series (a curve whose seed decode failed never
/// gets points). Ties on market cap are broken by earliest timestamp: a later
/// equal peak is not a new high.
pub fn summarize(series: &ValuationSeries) -> Option<CurveValuationSummary> {
    let launch = *series.launch()?;
    let current = *series.current()?;

    let mut ath = launch;
    let mut atl = launch;
    for point in &series.points {
        if point.market_cap_usd > ath.market_cap_usd {
            ath = *point;
        }
        if point.market_cap_usd < atl.market_cap_usd {
            atl = *point;
        }
    }

    Some(CurveValuationSummary {
        curve_address: series.curve_address.clone(),
        launch,
        all_time_high: ath,
        all_time_low: atl,
        current,
        percent_from_ath: percent_change(current.market_cap_usd, ath.market_cap_usd),
        percent_from_launch: percent_change(current.market_cap_usd, launch.market_cap_usd),
        time_to_ath_secs: ath.timestamp - launch.timestamp,
    })
}

/// Percent delta against a baseline; zero baseline has no meaningful answer
/// and maps to 0.
fn percent_change(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        (value - baseline) / baseline * 100.0
    }
}

/// Human-readable time-to-ATH, matching the report formatting:
/// "2 days 3 hours", "3 hours 12 minutes", "45 minutes".
pub fn format_duration(secs: i64) -> String {
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!(
            "{} day{} {} hour{}",
            days,
            if days > 1 { "s" } else { "" },
            hours % 24,
            if hours % 24 > 1 { "s" } else { "" }
        )
    } else if hours > 0 {
        format!(
            "{} hour{} {} minute{}",
            hours,
            if hours > 1 { "s" } else { "" },
            minutes % 60,
            if minutes % 60 > 1 { "s" } else { "" }
        )
    } else {
        format!("{} minute{}", minutes, if minutes > 1 { "s" } else { "" })
    }
}
