//! Browser and GPU adapters behind the domain and application layers.

pub mod http;
pub mod rendering;
pub mod services;
pub mod storage;
pub mod websocket;

pub use services::{BrowserTimeProvider, ConsoleLogger};
pub use storage::{DrawingStore, LocalStorageDrawingStore, MemoryDrawingStore};
