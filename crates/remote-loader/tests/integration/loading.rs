use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use remote_loader::LoadError;
use remote_loader::decode::{ImageFormat, RawDecoder, SniffDecoder};

use crate::{setup_loader, test, test_config};

#[tokio::test]
async fn test_load_over_http() {
    let server = test::HitCounter::new();
    let loader = setup_loader(test_config(None), RawDecoder);

    let url = server.url("bytes/hello.txt");
    let loaded = loader.load(url.as_str()).await;

    assert_eq!(loaded, Some(Bytes::from_static(b"hello.txt")));
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_missing_resource() {
    let server = test::HitCounter::new();
    let loader = setup_loader(test_config(None), RawDecoder);

    let url = server.url("respond_statuscode/404/missing.png");
    assert_eq!(loader.load(url.as_str()).await, None);
    assert_eq!(loader.try_load(url.as_str()).await, Err(LoadError::NotFound));

    // failures are not cached
    assert_eq!(server.accesses(), 2);
    assert_eq!(loader.load_cached(url.as_str()), None);
}

#[tokio::test]
async fn test_status_codes() {
    let server = test::HitCounter::new();
    let loader = setup_loader(test_config(None), RawDecoder);

    let forbidden = server.url("respond_statuscode/403/secret");
    assert!(matches!(
        loader.try_load(forbidden.as_str()).await,
        Err(LoadError::PermissionDenied(_))
    ));

    let broken = server.url("respond_statuscode/500/broken");
    assert!(matches!(
        loader.try_load(broken.as_str()).await,
        Err(LoadError::DownloadError(_))
    ));
}

#[tokio::test]
async fn test_concurrent_loads_hit_server_once() {
    let server = test::HitCounter::new();
    let loader = setup_loader(test_config(None), RawDecoder);

    let url = server.url("delay/100ms/bytes/shared");
    let results = join_all((0..10).map(|_| loader.load(url.as_str()))).await;

    for result in results {
        assert_eq!(result, Some(Bytes::from_static(b"shared")));
    }
    assert_eq!(
        server.all_hits(),
        [
            ("/bytes/shared".to_owned(), 1),
            ("/delay/100ms/bytes/shared".to_owned(), 1),
        ]
    );
    assert_eq!(loader.coalescer().pending(), 0);
}

#[tokio::test]
async fn test_head_timeout() {
    let server = test::HitCounter::new();
    let config = remote_loader::config::Config {
        head_timeout: Duration::from_millis(100),
        ..test_config(None)
    };
    let loader = setup_loader(config, RawDecoder);

    let url = server.url("delay/2s/bytes/slow");
    assert_eq!(
        loader.try_load(url.as_str()).await,
        Err(LoadError::Timeout(Duration::from_millis(100)))
    );
    assert_eq!(loader.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_download_timeout() {
    let server = test::HitCounter::new();
    let config = remote_loader::config::Config {
        max_download_timeout: Duration::from_millis(100),
        ..test_config(None)
    };
    let loader = setup_loader(config, RawDecoder);

    let url = server.url("delay/2s/bytes/slow");
    assert_eq!(
        loader.try_load(url.as_str()).await,
        Err(LoadError::Timeout(Duration::from_millis(100)))
    );
    assert_eq!(loader.load(url.as_str()).await, None);
    assert_eq!(loader.gate().in_flight(), 0);
    assert_eq!(loader.load_cached(url.as_str()), None);
}

#[tokio::test]
async fn test_sniff_images() {
    let server = test::HitCounter::new();
    let loader = setup_loader(test_config(None), SniffDecoder);

    let png = server.url("png/logo");
    let image = loader.load(png.as_str()).await.unwrap();
    assert_eq!(image.format, ImageFormat::Png);
    assert!(image.data.starts_with(test::PNG_MAGIC));

    let text = server.url("bytes/not-an-image");
    assert!(matches!(
        loader.try_load(text.as_str()).await,
        Err(LoadError::Malformed(_))
    ));
    // the raw bytes are cached anyway, so decoding fails again without a fetch
    assert_eq!(loader.load_cached(text.as_str()), None);
    assert_eq!(loader.load(text.as_str()).await, None);
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_invalid_identifier() {
    let loader = setup_loader(test_config(None), RawDecoder);

    assert!(matches!(
        loader.try_load("not a url").await,
        Err(LoadError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        loader.try_load("ftp://example.com/file").await,
        Err(LoadError::InvalidIdentifier(_))
    ));
}
