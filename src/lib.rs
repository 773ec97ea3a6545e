pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod errors;
pub mod geocoding;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod report;
pub mod secrets;
pub mod selection;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::{AppConfig, PublicAppConfig};
pub use dataset::{output_path, Dataset};
pub use dispatch::{parallel_map, DispatchProgress, ProgressObserver};
pub use errors::{AppError, AppResult};
pub use geocoding::{
    AddressComponent, GeocodeCandidate, Geocoder, GeocodingService, Geometry, HttpGeocoder, LatLng,
};
pub use pipeline::{geocode_queries, run_batch, BatchOutcome};
pub use progress::{bar_observer, geocoding_bar};
pub use query::Query;
pub use secrets::{resolve_api_key, ApiKey, KeySource};
pub use selection::{geocode_filter, select_candidates};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,douar_coords=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
