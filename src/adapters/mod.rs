pub mod api_client;
pub mod audio_cpal;
pub mod config_store;
pub mod location;
pub mod report;

pub use api_client::HttpThreatApi;
pub use audio_cpal::CpalRecorder;
pub use config_store::TomlConfigStore;
pub use location::{source_from_config, GeoIpLocationSource, StaticLocationSource};
pub use report::{render_html, HtmlReportWriter};
