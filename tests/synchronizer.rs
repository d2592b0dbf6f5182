mod common;

use abu_news::model::{ImageFile, ImageSource, NewsForm, NewsId};
use abu_news::payload::NewsPayload;
use abu_news::store::StoreError;
use abu_news::sync::{RemoveOutcome, SyncError, Synchronizer, ValidationError};
use common::{record, Call, RecordingStore};

fn open_day() -> NewsForm {
    NewsForm::from_pairs([
        ("title", "Open Day"),
        ("date", "2025-05-01"),
        ("description", "Campus tour for applicants"),
        ("content", "Details..."),
        ("imageUrl", "https://cdn.test/open-day.jpg"),
    ])
}

async fn loaded(store: &RecordingStore) -> Synchronizer<RecordingStore> {
    let mut sync = Synchronizer::new(store.clone(), "Admin");
    sync.load().await.unwrap();
    store.clear_calls().await;
    sync
}

#[tokio::test]
async fn invalid_forms_never_reach_the_store() {
    let store = RecordingStore::default();
    let mut sync = Synchronizer::new(store.clone(), "Admin");

    let cases = [
        ("title", ValidationError::MissingTitle),
        ("date", ValidationError::MissingDate),
        ("description", ValidationError::MissingDescription),
        ("content", ValidationError::MissingContent),
    ];
    for (field, expected) in cases {
        let mut form = open_day();
        match field {
            "title" => form.title = "  ".into(),
            "date" => form.date.clear(),
            "description" => form.description.clear(),
            _ => form.content = "\n".into(),
        }
        match sync.submit_create(&form).await {
            Err(SyncError::Validation(err)) => assert_eq!(err, expected),
            other => panic!("expected validation error for {}, got {:?}", field, other),
        }
    }

    let mut no_image = open_day();
    no_image.image_url.clear();
    assert!(matches!(
        sync.submit_create(&no_image).await,
        Err(SyncError::Validation(ValidationError::MissingImage))
    ));

    assert!(store.calls().await.is_empty());
    assert!(sync.records().is_empty());
}

#[tokio::test]
async fn create_stores_encoded_payload_with_localized_fallbacks() {
    let store = RecordingStore::default();
    let mut sync = loaded(&store).await;

    let row = sync.submit(&open_day()).await.unwrap();

    let calls = store.calls().await;
    assert_eq!(calls.len(), 1);
    let Call::Insert(sent) = &calls[0] else {
        panic!("expected insert, got {:?}", calls[0]);
    };
    assert_eq!(sent.title, "Open Day");
    assert_eq!(sent.author, "Admin");
    assert_eq!(
        sent.image_url.as_deref(),
        Some("https://cdn.test/open-day.jpg")
    );

    let payload = NewsPayload::decode(&sent.content).unwrap();
    assert_eq!(payload.main, "Details...");
    assert_eq!(payload.date, "2025-05-01");
    assert_eq!(payload.title_ru, "Open Day");
    assert_eq!(payload.title_en, "Open Day");
    assert_eq!(payload.title_kz, "Open Day");
    assert_eq!(payload.description_kz, "Campus tour for applicants");

    assert_eq!(sync.records().len(), 1);
    assert_eq!(sync.records()[0].id, row.id);
}

#[tokio::test]
async fn picked_file_is_uploaded_before_insert() {
    let store = RecordingStore::default();
    let mut sync = loaded(&store).await;

    let mut form = open_day();
    form.image_url.clear();
    let form = form.with_image(ImageFile::new("poster.PNG", vec![1, 2, 3, 4]));

    let row = sync.submit_create(&form).await.unwrap();

    let calls = store.calls().await;
    assert_eq!(
        calls[0],
        Call::Upload {
            size: 4,
            ext: "png".into()
        }
    );
    let Call::Insert(sent) = &calls[1] else {
        panic!("expected insert after upload");
    };
    assert_eq!(
        sent.image_url.as_deref(),
        Some("https://cdn.test/news/upload-4.png")
    );
    assert_eq!(row.image_url, sent.image_url);
}

#[tokio::test]
async fn update_without_new_image_keeps_stored_url() {
    let store = RecordingStore::with_rows(vec![record(
        "7",
        "Old title",
        "2025-03-01",
        Some("https://cdn.test/old.jpg"),
    )]);
    let mut sync = loaded(&store).await;

    let mut form = sync.begin_edit(&NewsId::new("7")).unwrap();
    assert_eq!(sync.edit_target(), Some(&NewsId::new("7")));
    assert_eq!(form.date, "2025-03-01");
    assert!(form.image_url.is_empty());
    form.title = "New title".into();

    let row = sync.submit(&form).await.unwrap();

    let calls = store.calls().await;
    assert_eq!(calls.len(), 1);
    let Call::Update(id, patch) = &calls[0] else {
        panic!("expected update, got {:?}", calls[0]);
    };
    assert_eq!(id.as_str(), "7");
    assert_eq!(patch.image_url.as_deref(), Some("https://cdn.test/old.jpg"));
    assert_eq!(row.title, "New title");
    assert_eq!(sync.records()[0].title, "New title");
    assert!(sync.edit_target().is_none());
}

#[tokio::test]
async fn update_with_no_image_anywhere_is_rejected() {
    let store = RecordingStore::with_rows(vec![record("7", "Bare", "2025-03-01", None)]);
    let mut sync = loaded(&store).await;

    let form = sync.begin_edit(&NewsId::new("7")).unwrap();
    let err = sync.submit(&form).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::MissingImage)
    ));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn store_failure_leaves_cache_untouched() {
    let store = RecordingStore::with_rows(vec![record(
        "1",
        "Existing",
        "2025-01-10",
        Some("https://cdn.test/a.jpg"),
    )]);
    let mut sync = loaded(&store).await;
    store
        .fail_next(StoreError::unavailable("service is down"))
        .await;

    let err = sync.submit_create(&open_day()).await.unwrap_err();

    match err {
        SyncError::Store(err) => assert!(err.is_unavailable()),
        other => panic!("expected store error, got {:?}", other),
    }
    assert_eq!(sync.records().len(), 1);
    assert_eq!(sync.records()[0].title, "Existing");
}

#[tokio::test]
async fn removing_missing_id_keeps_cache() {
    let store = RecordingStore::with_rows(vec![
        record("1", "First", "2025-01-10", Some("https://cdn.test/a.jpg")),
        record("2", "Second", "2025-02-10", Some("https://cdn.test/b.jpg")),
    ]);
    let mut sync = loaded(&store).await;

    let outcome = sync
        .remove(&NewsId::new("missing"), &|_: &str| true)
        .await
        .unwrap();

    assert_eq!(outcome, RemoveOutcome::Missing);
    assert_eq!(sync.records().len(), 2);
}

#[tokio::test]
async fn declined_remove_sends_nothing() {
    let store = RecordingStore::with_rows(vec![record(
        "1",
        "First",
        "2025-01-10",
        Some("https://cdn.test/a.jpg"),
    )]);
    let mut sync = loaded(&store).await;

    let outcome = sync
        .remove(&NewsId::new("1"), &|_: &str| false)
        .await
        .unwrap();

    assert_eq!(outcome, RemoveOutcome::Declined);
    assert!(store.calls().await.is_empty());
    assert_eq!(sync.records().len(), 1);
}

#[tokio::test]
async fn confirmed_remove_drops_record() {
    let store = RecordingStore::with_rows(vec![
        record("1", "First", "2025-01-10", Some("https://cdn.test/a.jpg")),
        record("2", "Second", "2025-02-10", Some("https://cdn.test/b.jpg")),
    ]);
    let mut sync = loaded(&store).await;
    sync.begin_edit(&NewsId::new("1"));

    let outcome = sync
        .remove(&NewsId::new("1"), &|_: &str| true)
        .await
        .unwrap();

    assert_eq!(outcome, RemoveOutcome::Removed);
    assert_eq!(store.calls().await, vec![Call::Delete(NewsId::new("1"))]);
    assert!(sync.record(&NewsId::new("1")).is_none());
    assert!(sync.edit_target().is_none());
}

#[tokio::test]
async fn preview_is_local_only() {
    let store = RecordingStore::default();
    let sync = Synchronizer::new(store.clone(), "Admin");

    let mut form = open_day();
    form.title_en = "Open Day 2025".into();
    let form = form.with_image(ImageFile::new("poster.jpg", vec![9; 16]));

    let view = sync.render_preview(&form);

    assert_eq!(view.title.en, "Open Day 2025");
    assert_eq!(view.title.ru, "Open Day");
    assert_eq!(view.date_label.en, "May 1, 2025");
    assert_eq!(view.content, "Details...");
    assert!(matches!(
        view.image,
        ImageSource::Inline {
            content_type: "image/jpeg",
            ..
        }
    ));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn stored_record_preview_uses_its_image() {
    let store = RecordingStore::with_rows(vec![record(
        "5",
        "Graduation",
        "2025-06-20",
        Some("https://cdn.test/grad.jpg"),
    )]);
    let sync = loaded(&store).await;

    let view = sync.preview_record(&NewsId::new("5")).unwrap();

    assert_eq!(view.title.kz, "Graduation");
    assert_eq!(view.image, ImageSource::Url("https://cdn.test/grad.jpg".into()));
    assert!(sync.preview_record(&NewsId::new("nope")).is_none());
}
