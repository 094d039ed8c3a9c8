//! Temperature line chart built from the hourly series.
//!
//! A [`ChartRenderer`] owns at most one live chart per surface and disposes it
//! before drawing the next one, and again when the renderer is dropped.

use chrono::NaiveDateTime;
use tracing::trace;

use crate::{
    date_range::DateRange,
    model::{DailyPoint, ForecastSeries, HourlyPoint},
};

pub const TEMPERATURE_LABEL: &str = "Temperature (°C)";
pub const MAX_X_TICKS: usize = 12;

/// Points with `start <= time <= end`, in their original order.
pub fn filter_hourly(
    points: &[HourlyPoint],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<HourlyPoint> {
    points.iter().filter(|p| start <= p.time && p.time <= end).cloned().collect()
}

/// Hourly points falling on any day of `range`.
pub fn hourly_in_range(series: &ForecastSeries, range: &DateRange) -> Vec<HourlyPoint> {
    let (start, end) = range.window();
    filter_hourly(&series.hourly, start, end)
}

pub fn daily_in_range(series: &ForecastSeries, range: &DateRange) -> Vec<DailyPoint> {
    series.daily.iter().filter(|d| range.contains_date(d.date)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub max_x_ticks: usize,
}

impl LineChart {
    /// Temperature chart for the hourly samples inside `range`. An empty
    /// selection yields a chart with no points.
    pub fn temperature(series: &ForecastSeries, range: &DateRange) -> Self {
        let points = hourly_in_range(series, range);

        let labels = points.iter().map(|p| p.time.format("%d %H:%M").to_string()).collect();
        let data = points.iter().map(|p| p.temperature_c).collect();

        Self {
            title: format!("Temperature forecast ({range})"),
            labels,
            datasets: vec![Dataset { label: TEMPERATURE_LABEL.to_string(), data }],
            max_x_ticks: MAX_X_TICKS,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A drawing target that hands out one handle per drawn chart.
pub trait ChartSurface {
    type Handle;

    fn draw(&mut self, chart: &LineChart) -> Self::Handle;

    fn dispose(&mut self, handle: Self::Handle);
}

#[derive(Debug)]
pub struct ChartRenderer<S: ChartSurface> {
    surface: S,
    current: Option<S::Handle>,
}

impl<S: ChartSurface> ChartRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, current: None }
    }

    pub fn render(&mut self, chart: &LineChart) {
        self.dispose();
        trace!(points = chart.labels.len(), "Drawing chart");
        self.current = Some(self.surface.draw(chart));
    }

    pub fn dispose(&mut self) {
        if let Some(handle) = self.current.take() {
            self.surface.dispose(handle);
        }
    }

    pub fn is_drawn(&self) -> bool {
        self.current.is_some()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

impl<S: ChartSurface> Drop for ChartRenderer<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChartId(u64);

/// Renders charts as rows of horizontal bars for a terminal.
#[derive(Debug)]
pub struct TextSurface {
    width: usize,
    max_rows: usize,
    lines: Vec<String>,
    next_id: u64,
    live: Option<TextChartId>,
}

impl TextSurface {
    pub fn new(width: usize, max_rows: usize) -> Self {
        Self { width: width.max(1), max_rows: max_rows.max(1), lines: Vec::new(), next_id: 0, live: None }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn plot(&self, chart: &LineChart) -> Vec<String> {
        let mut out = vec![chart.title.clone()];

        let Some(dataset) = chart.datasets.first() else {
            return out;
        };

        let values: Vec<f64> = dataset.data.iter().flatten().copied().collect();
        if chart.is_empty() || values.is_empty() {
            out.push("(no data in range)".to_string());
            return out;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = (max - min).max(f64::EPSILON);

        let step = chart.labels.len().div_ceil(self.max_rows);
        for (label, value) in chart.labels.iter().zip(&dataset.data).step_by(step) {
            let row = match value {
                Some(v) => {
                    let len = 1 + (((v - min) / span) * (self.width - 1) as f64).round() as usize;
                    format!("{label:>8} {:>6.1} {}", v, "█".repeat(len))
                }
                None => format!("{label:>8}      -"),
            };
            out.push(row);
        }

        out.push(format!("{:>8} min {min:.1} / max {max:.1} {}", "", dataset.label));
        out
    }
}

impl ChartSurface for TextSurface {
    type Handle = TextChartId;

    fn draw(&mut self, chart: &LineChart) -> TextChartId {
        self.lines = self.plot(chart);
        let id = TextChartId(self.next_id);
        self.next_id += 1;
        self.live = Some(id);
        id
    }

    fn dispose(&mut self, handle: TextChartId) {
        if self.live == Some(handle) {
            self.lines.clear();
            self.live = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::{cell::RefCell, rc::Rc};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").expect("valid test timestamp")
    }

    /// Hourly points from `from` to `to` inclusive, temperature = index.
    fn hourly(from: &str, to: &str) -> Vec<HourlyPoint> {
        let (mut t, end) = (ts(from), ts(to));
        let mut out = Vec::new();
        while t <= end {
            out.push(HourlyPoint { time: t, temperature_c: Some(out.len() as f64), weather_code: Some(0) });
            t += Duration::hours(1);
        }
        out
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(start.parse().expect("date"), end.parse().expect("date")).expect("valid range")
    }

    #[test]
    fn three_day_range_keeps_three_days_of_hours() {
        let series = ForecastSeries { hourly: hourly("2024-01-01T00:00", "2024-01-05T00:00"), daily: vec![] };

        let kept = hourly_in_range(&series, &range("2024-01-01", "2024-01-03"));

        assert_eq!(kept.len(), 72);
        assert_eq!(kept.first().map(|p| p.time), Some(ts("2024-01-01T00:00")));
        assert_eq!(kept.last().map(|p| p.time), Some(ts("2024-01-03T23:00")));
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let points = hourly("2024-01-01T00:00", "2024-01-01T10:00");
        let kept = filter_hourly(&points, ts("2024-01-01T02:00"), ts("2024-01-01T04:00"));

        let times: Vec<_> = kept.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![ts("2024-01-01T02:00"), ts("2024-01-01T03:00"), ts("2024-01-01T04:00")]);
    }

    #[test]
    fn equal_bounds_keep_only_exact_matches() {
        let points = hourly("2024-01-01T00:00", "2024-01-01T10:00");

        let aligned = filter_hourly(&points, ts("2024-01-01T05:00"), ts("2024-01-01T05:00"));
        assert_eq!(aligned.len(), 1);

        let off_grid = ts("2024-01-01T05:00") + Duration::minutes(30);
        assert!(filter_hourly(&points, off_grid, off_grid).is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let points = hourly("2024-01-01T00:00", "2024-01-02T00:00");
        let (start, end) = (ts("2024-01-01T06:00"), ts("2024-01-01T18:00"));

        let once = filter_hourly(&points, start, end);
        let twice = filter_hourly(&once, start, end);

        assert_eq!(once, filter_hourly(&points, start, end));
        assert_eq!(once, twice);
    }

    #[test]
    fn range_outside_data_gives_empty_chart() {
        let series = ForecastSeries { hourly: hourly("2024-01-01T00:00", "2024-01-02T00:00"), daily: vec![] };
        let chart = LineChart::temperature(&series, &range("2024-02-01", "2024-02-03"));

        assert!(chart.is_empty());
        assert_eq!(chart.datasets[0].data.len(), 0);
        assert_eq!(chart.max_x_ticks, MAX_X_TICKS);
    }

    #[test]
    fn chart_labels_and_data_line_up() {
        let series = ForecastSeries { hourly: hourly("2024-01-01T00:00", "2024-01-01T02:00"), daily: vec![] };
        let chart = LineChart::temperature(&series, &range("2024-01-01", "2024-01-01"));

        assert_eq!(chart.labels, vec!["01 00:00", "01 01:00", "01 02:00"]);
        assert_eq!(chart.datasets[0].label, TEMPERATURE_LABEL);
        assert_eq!(chart.datasets[0].data, vec![Some(0.0), Some(1.0), Some(2.0)]);
        assert!(chart.title.contains("2024-01-01 - 2024-01-01"));
    }

    #[test]
    fn daily_points_follow_range() {
        let day = |d: &str| DailyPoint {
            date: d.parse::<NaiveDate>().expect("date"),
            temperature_max_c: Some(10.0),
            temperature_min_c: Some(1.0),
            weather_code: Some(0),
        };
        let series = ForecastSeries {
            hourly: vec![],
            daily: vec![day("2024-01-01"), day("2024-01-02"), day("2024-01-03")],
        };

        let kept = daily_in_range(&series, &range("2024-01-02", "2024-01-03"));
        assert_eq!(kept.len(), 2);
    }

    #[derive(Debug, Default)]
    struct RecordingSurface {
        log: Vec<String>,
        next: u32,
    }

    impl ChartSurface for RecordingSurface {
        type Handle = u32;

        fn draw(&mut self, _chart: &LineChart) -> u32 {
            self.next += 1;
            self.log.push(format!("draw {}", self.next));
            self.next
        }

        fn dispose(&mut self, handle: u32) {
            self.log.push(format!("dispose {handle}"));
        }
    }

    #[test]
    fn rerender_disposes_previous_chart_first() {
        let series = ForecastSeries { hourly: hourly("2024-01-01T00:00", "2024-01-01T03:00"), daily: vec![] };
        let chart = LineChart::temperature(&series, &range("2024-01-01", "2024-01-01"));

        let mut renderer = ChartRenderer::new(RecordingSurface::default());
        renderer.render(&chart);
        renderer.render(&chart);

        assert_eq!(renderer.surface().log, vec!["draw 1", "dispose 1", "draw 2"]);
        assert!(renderer.is_drawn());
    }

    #[test]
    fn text_surface_clears_when_disposed() {
        let series = ForecastSeries { hourly: hourly("2024-01-01T00:00", "2024-01-01T23:00"), daily: vec![] };
        let chart = LineChart::temperature(&series, &range("2024-01-01", "2024-01-01"));

        let mut renderer = ChartRenderer::new(TextSurface::new(20, 6));
        renderer.render(&chart);

        let lines = renderer.surface().lines();
        assert_eq!(lines[0], chart.title);
        // title + 6 sampled rows + footer
        assert_eq!(lines.len(), 8);

        renderer.dispose();
        assert!(renderer.surface().lines().is_empty());
        assert!(!renderer.is_drawn());
    }

    /// Records into a log that outlives the renderer.
    #[derive(Debug, Default)]
    struct SharedLogSurface {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ChartSurface for SharedLogSurface {
        type Handle = u32;

        fn draw(&mut self, _chart: &LineChart) -> u32 {
            self.log.borrow_mut().push("draw".into());
            7
        }

        fn dispose(&mut self, handle: u32) {
            self.log.borrow_mut().push(format!("dispose {handle}"));
        }
    }

    #[test]
    fn dropping_renderer_disposes_live_chart() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let chart = LineChart::temperature(&ForecastSeries::default(), &range("2024-01-01", "2024-01-01"));

        {
            let mut renderer = ChartRenderer::new(SharedLogSurface { log: Rc::clone(&log) });
            renderer.render(&chart);
        }

        assert_eq!(*log.borrow(), vec!["draw", "dispose 7"]);
    }

    #[test]
    fn dropping_undrawn_renderer_disposes_nothing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        drop(ChartRenderer::new(SharedLogSurface { log: Rc::clone(&log) }));

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn text_surface_reports_empty_range() {
        let chart = LineChart::temperature(&ForecastSeries::default(), &range("2024-01-01", "2024-01-02"));
        let mut surface = TextSurface::new(20, 6);
        surface.draw(&chart);

        assert_eq!(surface.lines().last().map(String::as_str), Some("(no data in range)"));
    }
}
