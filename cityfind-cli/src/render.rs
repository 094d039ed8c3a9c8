//! Human-friendly terminal output.

use cityfind_core::{
    ChartRenderer, LineChart, SearchState, TextSurface, WeatherView,
    dashboard::Dashboard,
    view::{self, population_bars},
};

const CHART_WIDTH: usize = 40;
const CHART_ROWS: usize = 24;

pub fn chart_renderer() -> ChartRenderer<TextSurface> {
    ChartRenderer::new(TextSurface::new(CHART_WIDTH, CHART_ROWS))
}

pub fn print_search_state(state: &SearchState) {
    if state.loading {
        println!("Searching for \"{}\"...", state.query);
        return;
    }
    if let Some(error) = &state.error {
        println!("{error}");
        return;
    }
    for (i, entry) in view::search_entries(&state.results).iter().enumerate() {
        println!("{:>2}. {entry}  [id {}]", i + 1, state.results[i].id);
    }
}

/// Print the summary card, redraw the chart and list the daily strip.
pub fn print_weather_view(weather: &WeatherView, renderer: &mut ChartRenderer<TextSurface>) {
    println!();
    for line in view::current_summary(&weather.city, &weather.forecast.current) {
        println!("  {line}");
    }

    renderer.render(&LineChart::temperature(&weather.forecast.series, &weather.range));
    println!();
    for line in renderer.surface().lines() {
        println!("  {line}");
    }

    println!();
    println!("  Daily forecast ({})", weather.range);
    let cards = view::daily_strip(&weather.forecast.series, &weather.range);
    if cards.is_empty() {
        println!("  (no days in range)");
    }
    for card in cards {
        println!("  {card}");
    }
}

pub fn print_dashboard(dash: &Dashboard) {
    println!("Most populous cities");
    for line in population_bars(&dash.popular, CHART_WIDTH) {
        println!("  {line}");
    }

    println!();
    println!("Weather in {}", dash.location.name);
    match &dash.local {
        Ok(forecast) => {
            let now = &forecast.current;
            println!("  {:.1}°C, wind {} km/h at {}", now.temperature_c, now.wind_speed_kmh, now.time.format("%H:%M"));
            if let Some(humidity) = now.humidity_pct {
                println!("  Humidity: {humidity:.0}%");
            }
            for day in forecast.series.daily.iter().map(view::DayCard::from) {
                println!("  {day}");
            }
        }
        Err(e) => println!("  {}", e.user_message()),
    }
}
