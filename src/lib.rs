use wasm_bindgen::prelude::*;

use crate::domain::logging::{LogComponent, get_logger};

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod time_utils;

#[cfg(target_arch = "wasm32")]
pub mod app;

/// Install the panic hook, the console logger and the browser clock.
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();

    let console_logger = Box::new(infrastructure::services::ConsoleLogger::new_development());
    domain::logging::init_logger(console_logger);

    let browser_time_provider = Box::new(infrastructure::services::BrowserTimeProvider::new());
    domain::logging::init_time_provider(browser_time_provider);

    get_logger().info(LogComponent::Presentation("Initialize"), "candle chart module loaded");
}

/// Whether this browser can host the chart.
#[wasm_bindgen(js_name = isWebGpuSupported)]
pub fn is_webgpu_supported() -> bool {
    #[cfg(target_arch = "wasm32")]
    {
        infrastructure::rendering::renderer::is_webgpu_supported()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        false
    }
}

/// Mount the leptos chart view on `<body>`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = mountChartApp)]
pub fn mount_chart_app(config: JsValue) -> Result<(), JsValue> {
    use crate::app::App;

    let config = if config.is_undefined() || config.is_null() {
        config::DEFAULT_CONFIG.clone()
    } else {
        let text: String = js_sys::JSON::stringify(&config)?.into();
        config::EngineConfig::from_json(&text)?
    };
    leptos::mount_to_body(move || leptos::view! { <App config=config.clone() /> });
    Ok(())
}
