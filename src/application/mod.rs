//! Orchestration between the domain model, the adapters and the host.

pub mod composition;
pub mod input;
pub mod realtime;
pub mod renderer;
pub mod scheduler;

pub use composition::{AxisLabel, ChartComposition, ChartEvent, Crosshair, HudModel};
pub use input::{CanvasInput, InputTarget};
pub use realtime::{RealtimeDataManager, Subscription, bind_chart};
pub use renderer::ChartRenderer;
pub use scheduler::{AnimationFrameScheduler, Clock, FrameScheduler, ManualClock, ManualFrameScheduler, PerformanceClock};
