//! Component construction
//!
//! Builds the stage context from configuration: real providers by
//! default, in-memory mocks when the mock flags are set or credentials
//! are absent. Mocks implement the same facade traits, so nothing
//! downstream can tell the difference.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::StageContext;
use crate::bus::EventBus;
use crate::config::CoordinationConfig;
use crate::error::PipelineError;
use crate::notify::{MockNotifier, Notifier, SmsNotifier};
use crate::pipeline::EventLog;
use crate::store::{MemoryVectorStore, SledVectorStore, VectorStore};
use crate::weather::{HttpWeatherProvider, MockWeatherProvider, WeatherProvider};

/// Build the full stage context from configuration.
pub fn build_context(config: CoordinationConfig) -> Result<Arc<StageContext>, PipelineError> {
    let providers = &config.providers;

    let store: Arc<dyn VectorStore> = if providers.use_mock_store {
        info!("Vector store: in-memory mock");
        Arc::new(MemoryVectorStore::new())
    } else {
        info!(path = %providers.store_path, "Vector store: sled");
        Arc::new(SledVectorStore::open(&providers.store_path)?)
    };

    let weather: Arc<dyn WeatherProvider> = if providers.use_mock_weather {
        info!("Weather provider: deterministic mock");
        Arc::new(MockWeatherProvider::new())
    } else {
        info!(url = %providers.weather_base_url, "Weather provider: HTTP");
        Arc::new(HttpWeatherProvider::new(
            &providers.weather_base_url,
            providers.weather_api_key.clone(),
        )?)
    };

    let notifier: Arc<dyn Notifier> = if providers.use_mock_notifier {
        info!("Notifier: mock with synthetic receipts");
        Arc::new(MockNotifier::new())
    } else {
        match providers.sms_api_key.as_deref() {
            Some(key) => {
                info!(url = %providers.sms_base_url, "Notifier: SMS gateway");
                Arc::new(SmsNotifier::new(&providers.sms_base_url, key)?)
            }
            None => {
                warn!("No SMS credentials configured — falling back to mock notifier");
                Arc::new(MockNotifier::new())
            }
        }
    };

    Ok(build_with(config, store, weather, notifier))
}

/// Build the context around explicit components (tests inject their
/// own mocks here).
pub fn build_with(
    config: CoordinationConfig,
    store: Arc<dyn VectorStore>,
    weather: Arc<dyn WeatherProvider>,
    notifier: Arc<dyn Notifier>,
) -> Arc<StageContext> {
    let bus = Arc::new(EventBus::new());
    let events = Arc::new(EventLog::new(Arc::clone(&store), Arc::clone(&bus)));
    Arc::new(StageContext::new(config, store, weather, notifier, bus, events))
}
