use candle_chart_wasm::application::{ChartRenderer, ManualClock};
use candle_chart_wasm::config::{DrawingStyles, EngineConfig, SeriesPalette};
use candle_chart_wasm::domain::chart::{DrawingPoint, DrawingShape, ShapeKind, ViewState};
use candle_chart_wasm::domain::market_data::Candle;
use candle_chart_wasm::infrastructure::rendering::RecordingBackend;
use candle_chart_wasm::infrastructure::rendering::drawings::{TRENDLINE_KEY, build_drawing_geometry};
use candle_chart_wasm::infrastructure::rendering::geometry::generate_candlestick_geometry;
use insta::{assert_json_snapshot, with_settings};
use std::rc::Rc;

fn three_candles() -> Vec<Candle> {
    vec![
        Candle::from_values(0, 10.0, 12.0, 9.0, 11.0, 0.0),
        Candle::from_values(60_000, 11.0, 11.0, 8.0, 9.0, 0.0),
        Candle::from_values(120_000, 9.0, 10.0, 8.0, 9.5, 0.0),
    ]
}

#[test]
fn three_candle_colors_and_wicks() {
    let palette = SeriesPalette::default();
    let geometry = generate_candlestick_geometry(&three_candles(), &palette);

    assert_eq!(geometry.bullish, vec![true, false, true]);
    assert_eq!(geometry.wick_positions.len(), 6);
    for (i, wick) in geometry.wick_positions.chunks(2).enumerate() {
        assert_eq!(wick[0][0], wick[1][0], "wick {i} is vertical");
        assert!(wick[0][1] < wick[1][1], "wick {i} runs from low to high");
        assert!(wick.iter().all(|p| (-1.0..=1.0).contains(&p[1])));
    }
    assert_eq!(geometry.body_colors[0], palette.bullish.to_array());
    assert_eq!(geometry.body_colors[4], palette.bearish.to_array());
    assert_eq!(geometry.body_indices.len(), 18);
}

#[test]
fn doji_is_bullish_without_body() {
    let geometry =
        generate_candlestick_geometry(&[Candle::from_values(0, 5.0, 6.0, 4.0, 5.0, 0.0)], &SeriesPalette::default());
    assert_eq!(geometry.bullish, vec![true]);
    assert!(geometry.body_positions.is_empty());
    assert_eq!(geometry.wick_positions.len(), 2);
}

#[test]
fn three_candle_metrics_snapshot() {
    let geometry = generate_candlestick_geometry(&three_candles(), &SeriesPalette::default());
    with_settings!({snapshot_path => "fixtures"}, {
        assert_json_snapshot!("three_candle_metrics", geometry.metrics);
    });
}

#[test]
fn visible_range_snapshot() {
    let clock = Rc::new(ManualClock::new(0.0));
    let mut renderer = ChartRenderer::new(RecordingBackend::new(), &EngineConfig::default(), clock);
    renderer.render_candlestick(three_candles());
    renderer.render();

    let full = renderer.visible_range();
    renderer.zoom_to_range(-1.0 / 3.0, 1.0);
    let zoomed = renderer.visible_range();

    with_settings!({snapshot_path => "fixtures"}, {
        assert_json_snapshot!("visible_range_full", full);
        assert_json_snapshot!("visible_range_zoomed", zoomed);
    });
}

#[test]
fn draft_shapes_are_translucent() {
    let styles = DrawingStyles::default();
    let metrics = generate_candlestick_geometry(&three_candles(), &SeriesPalette::default())
        .metrics
        .expect("metrics for non-empty data");
    let kind = ShapeKind::Trendline { start: DrawingPoint::new(-0.5, 9.0), end: DrawingPoint::new(0.5, 11.0) };
    let committed = DrawingShape::new("a", kind.clone());
    let preview = DrawingShape::preview(kind);

    let alpha_of = |shape: DrawingShape| {
        let buckets = build_drawing_geometry(&[shape], &ViewState::default(), &metrics, &styles);
        let bucket = buckets.iter().find(|b| b.key == TRENDLINE_KEY).expect("trendline layer");
        bucket.colors[0][3]
    };
    let solid = alpha_of(committed);
    let draft = alpha_of(preview);
    assert!((draft - solid * styles.draft_alpha as f32).abs() < 1e-6);
    assert!(draft < solid);
}
