use std::path::Path;
use std::sync::Arc;

use remote_loader::Loader;
use remote_loader::config::Config;
use remote_loader::decode::Decoder;
use remote_loader::services::LoaderServices;

pub use remote_loader_test as test;

mod caching;
mod loading;

/// Creates a config for tests, optionally persisting into `cache_dir`.
pub fn test_config(cache_dir: Option<&Path>) -> Config {
    Config {
        cache_dir: cache_dir.map(Path::to_path_buf),
        ..Config::default()
    }
}

/// Creates a shared loader from the given config.
pub fn setup_loader<D: Decoder>(config: Config, decoder: D) -> Arc<Loader<D>> {
    test::setup();
    let services = LoaderServices::new(config).unwrap();
    Arc::new(services.loader(decoder))
}
