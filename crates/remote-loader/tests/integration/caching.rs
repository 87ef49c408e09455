use bytes::Bytes;
use remote_loader::caching::CacheKey;
use remote_loader::decode::RawDecoder;

use crate::{setup_loader, test, test_config};

#[tokio::test]
async fn test_filesystem_cache_survives_restart() {
    let server = test::HitCounter::new();
    let cache_dir = test::tempdir();
    let url = server.url("bytes/persisted");

    {
        let loader = setup_loader(test_config(Some(cache_dir.path())), RawDecoder);
        assert_eq!(
            loader.load(url.as_str()).await,
            Some(Bytes::from_static(b"persisted"))
        );
    }
    assert_eq!(server.accesses(), 1);

    let key = CacheKey::from_identifier(url.as_str());
    let item = cache_dir
        .path()
        .join("resources/data")
        .join(key.cache_path());
    assert_eq!(std::fs::read(item).unwrap(), b"persisted");

    // a fresh loader has an empty memory tier, but finds the file
    let loader = setup_loader(test_config(Some(cache_dir.path())), RawDecoder);
    assert_eq!(
        loader.load_cached(url.as_str()),
        Some(Bytes::from_static(b"persisted"))
    );
    assert_eq!(
        loader.load(url.as_str()).await,
        Some(Bytes::from_static(b"persisted"))
    );
    assert_eq!(server.accesses(), 0);
}

#[tokio::test]
async fn test_memory_only_cache() {
    let server = test::HitCounter::new();
    let url = server.url("bytes/ephemeral");

    let loader = setup_loader(test_config(None), RawDecoder);
    loader.load(url.as_str()).await.unwrap();
    loader.load(url.as_str()).await.unwrap();
    assert_eq!(server.accesses(), 1);

    // nothing is persisted, so another loader fetches again
    let loader = setup_loader(test_config(None), RawDecoder);
    assert_eq!(loader.load_cached(url.as_str()), None);
    loader.load(url.as_str()).await.unwrap();
    assert_eq!(server.accesses(), 1);
}
