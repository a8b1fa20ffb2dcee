use crate::history::ResultRecord;

/// (attempt number, wpm) points for the history chart, oldest first
pub fn history_points(records: &[ResultRecord]) -> Vec<(f64, f64)> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| ((i + 1) as f64, r.words_per_minute as f64))
        .collect()
}

/// X (attempts) and Y (WPM) upper bounds for the history chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let highest_wpm = points.iter().map(|&(_, wpm)| wpm).fold(0.0, f64::max);
    let attempts = points.last().map_or(1.0, |p| p.0).max(2.0);

    // keep a flat zero line visible
    (attempts, highest_wpm.round().max(10.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
