mod common;

use tempfile::tempdir;

use common::{image_service, write_file};
use papershelf::infrastructure::file_system::stable_image_id;
use papershelf::{SearchOutcome, VectorRepository};

#[tokio::test]
async fn reindexing_keeps_one_record_per_path() {
    let dir = tempdir().unwrap();
    let photos = dir.path().join("photos");
    write_file(&photos.join("cat.png"), b"cat");
    write_file(&photos.join("trip/car.JPG"), b"car");
    write_file(&photos.join("notes.txt"), b"dog");

    let (service, repo) = image_service();
    let first = service.index(&photos).await.unwrap();
    assert_eq!(first.discovered, 2);
    assert_eq!(first.indexed, 2);
    assert_eq!(first.dimension, Some(3));
    assert_eq!(first.total_records, 2);

    let second = service.index(&photos).await.unwrap();
    assert_eq!(second.total_records, 2);
    assert_eq!(repo.count().await.unwrap(), 2);

    let hits = service.search("a cat", 1).await.unwrap().into_hits();
    assert_eq!(hits[0].id, stable_image_id(&photos.join("cat.png")).unwrap());
}

#[tokio::test]
async fn search_ranks_by_cosine_distance() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("cat.png"), b"cat");
    write_file(&dir.path().join("dog.webp"), b"dog");
    write_file(&dir.path().join("catdog.gif"), b"cat dog");

    let (service, _repo) = image_service();
    service.index(dir.path()).await.unwrap();

    let hits = service.search("a dog in the park", 3).await.unwrap().into_hits();
    assert_eq!(hits.len(), 3);
    assert!(hits[0].path.ends_with("dog.webp"));
    assert!(hits[0].distance.abs() < 1e-6);
    assert!(hits[1].path.ends_with("catdog.gif"));
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn single_image_can_be_indexed() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("cat.jpeg");
    write_file(&image, b"cat");

    let (service, _repo) = image_service();
    let report = service.index(&image).await.unwrap();
    assert_eq!(report.indexed, 1);

    let hits = service.search("cat", 5).await.unwrap().into_hits();
    assert_eq!(hits.len(), 1);
    assert!(std::path::Path::new(&hits[0].path).is_absolute());
}

#[tokio::test]
async fn folder_without_images_reports_nothing() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("readme.md"), b"cat");

    let (service, _repo) = image_service();
    let report = service.index(dir.path()).await.unwrap();
    assert_eq!(report.discovered, 0);
    assert_eq!(report.dimension, None);
    assert_eq!(report.total_records, 0);
}

#[tokio::test]
async fn search_on_empty_library_is_not_an_error() {
    let (service, _repo) = image_service();
    let outcome = service.search("a cat", 5).await.unwrap();
    assert!(outcome.is_empty_library());
}

#[tokio::test]
async fn reset_drops_the_collection() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("cat.png"), b"cat");

    let (service, repo) = image_service();
    service.index(dir.path()).await.unwrap();

    assert!(service.reset().await.unwrap());
    assert!(!service.reset().await.unwrap(), "second reset finds nothing to drop");

    repo.initialize_collection().await.unwrap();
    assert_eq!(service.count().await.unwrap(), 0);
    assert_eq!(service.search("cat", 5).await.unwrap(), SearchOutcome::EmptyLibrary);
}
