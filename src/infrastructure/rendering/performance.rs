use super::backend::FrameStats;
use crate::domain::logging::LogComponent;
use crate::log_warn;
use serde::Serialize;
use std::collections::VecDeque;

const HISTORY_SIZE: usize = 60;
const UPDATE_INTERVAL_MS: f64 = 1000.0;
const LOW_FPS_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub fps: f64,
    pub frame_time: f64,
    pub draw_calls: f64,
    pub vertices: f64,
    pub triangles: f64,
    pub buffer_size: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub current: PerformanceMetrics,
    pub average: PerformanceMetrics,
    pub min: PerformanceMetrics,
    pub max: PerformanceMetrics,
    pub samples: usize,
}

/// Frame timing and draw statistics over the last 60 frames.
/// Disabled monitors ignore every call.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    enabled: bool,
    history: VecDeque<PerformanceMetrics>,
    current: PerformanceMetrics,
    stats: PerformanceStats,
    frame: FrameStats,
    frame_start: f64,
    last_frame_end: Option<f64>,
    last_update: f64,
    frame_count: u64,
}

impl PerformanceMonitor {
    pub fn new(enabled: bool, now_ms: f64) -> Self {
        Self {
            enabled,
            history: VecDeque::with_capacity(HISTORY_SIZE),
            current: PerformanceMetrics::default(),
            stats: PerformanceStats::default(),
            frame: FrameStats::default(),
            frame_start: now_ms,
            last_frame_end: None,
            last_update: now_ms,
            frame_count: 0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start_frame(&mut self, now_ms: f64) {
        if !self.enabled {
            return;
        }
        self.frame_start = now_ms;
        self.frame = FrameStats::default();
    }

    pub fn record_draw_call(&mut self, vertices: usize, triangles: usize, bytes: usize) {
        if !self.enabled {
            return;
        }
        self.frame.draw_calls += 1;
        self.frame.vertices += vertices;
        self.frame.triangles += triangles;
        self.frame.bytes_uploaded += bytes;
    }

    /// Fold in totals reported by the backend for a whole frame.
    pub fn record_frame_stats(&mut self, stats: &FrameStats) {
        if !self.enabled {
            return;
        }
        self.frame.draw_calls += stats.draw_calls;
        self.frame.vertices += stats.vertices;
        self.frame.triangles += stats.triangles;
        self.frame.bytes_uploaded += stats.bytes_uploaded;
    }

    pub fn end_frame(&mut self, now_ms: f64) {
        if !self.enabled {
            return;
        }
        let delta = self.last_frame_end.map_or(0.0, |last| now_ms - last);
        self.last_frame_end = Some(now_ms);

        self.current = PerformanceMetrics {
            fps: if delta > 0.0 { 1000.0 / delta } else { 0.0 },
            frame_time: now_ms - self.frame_start,
            draw_calls: self.frame.draw_calls as f64,
            vertices: self.frame.vertices as f64,
            triangles: self.frame.triangles as f64,
            buffer_size: self.frame.bytes_uploaded as f64,
            timestamp: now_ms,
        };
        self.history.push_back(self.current);
        if self.history.len() > HISTORY_SIZE {
            self.history.pop_front();
        }

        if now_ms - self.last_update >= UPDATE_INTERVAL_MS {
            self.update_stats(now_ms);
            if self.stats.samples > 0 && self.stats.average.fps < LOW_FPS_THRESHOLD {
                log_warn!(
                    LogComponent::Infrastructure("PerformanceMonitor"),
                    "average fps {:.1} below {}",
                    self.stats.average.fps,
                    LOW_FPS_THRESHOLD
                );
            }
            self.last_update = now_ms;
        }
        self.frame_count += 1;
    }

    fn update_stats(&mut self, now_ms: f64) {
        if self.history.is_empty() {
            return;
        }
        let n = self.history.len() as f64;
        let fold = |init: f64, f: fn(f64, f64) -> f64| {
            let pick = |g: fn(&PerformanceMetrics) -> f64| self.history.iter().map(g).fold(init, f);
            PerformanceMetrics {
                fps: pick(|m| m.fps),
                frame_time: pick(|m| m.frame_time),
                draw_calls: pick(|m| m.draw_calls),
                vertices: pick(|m| m.vertices),
                triangles: pick(|m| m.triangles),
                buffer_size: pick(|m| m.buffer_size),
                timestamp: now_ms,
            }
        };
        let sum = fold(0.0, |a, b| a + b);
        let average = PerformanceMetrics {
            fps: sum.fps / n,
            frame_time: sum.frame_time / n,
            draw_calls: sum.draw_calls / n,
            vertices: sum.vertices / n,
            triangles: sum.triangles / n,
            buffer_size: sum.buffer_size / n,
            timestamp: now_ms,
        };
        self.stats = PerformanceStats {
            current: self.current,
            average,
            min: fold(f64::INFINITY, f64::min),
            max: fold(f64::NEG_INFINITY, f64::max),
            samples: self.history.len(),
        };
    }

    pub fn stats(&self) -> PerformanceStats {
        self.stats
    }

    pub fn current(&self) -> PerformanceMetrics {
        self.current
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.current = PerformanceMetrics::default();
        self.stats = PerformanceStats::default();
        self.frame = FrameStats::default();
        self.last_frame_end = None;
        self.frame_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_refresh_once_per_second() {
        let mut monitor = PerformanceMonitor::new(true, 0.0);
        let mut now = 0.0;
        for _ in 0..70 {
            monitor.start_frame(now);
            monitor.record_draw_call(4, 2, 96);
            now += 20.0;
            monitor.end_frame(now);
        }
        let stats = monitor.stats();
        assert_eq!(stats.samples, 50);
        assert!((stats.average.draw_calls - 1.0).abs() < 1e-9);
        assert!((stats.max.fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn disabling_resets_history() {
        let mut monitor = PerformanceMonitor::new(true, 0.0);
        monitor.start_frame(0.0);
        monitor.end_frame(16.0);
        monitor.set_enabled(false);
        monitor.end_frame(32.0);
        assert_eq!(monitor.frame_count(), 0);
        assert_eq!(monitor.stats().samples, 0);
    }
}
