//! End-to-end catalog tests over a real SQLite database, a temp-dir local
//! backend, and a strict mock backend for call-count and resource-tag
//! assertions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use studyshare::config::{DatabaseConfig, LocalStoreConfig};
use studyshare::db::Database;
use studyshare::error::AppError;
use studyshare::models::{CatalogFilter, CurrentUser, UploadMeta, UserRole};
use studyshare::services::catalog::ResolvedContent;
use studyshare::services::{CatalogService, CommentService, NotificationService};
use studyshare::storage::{BackendKind, BlobStore, LocalStore};

async fn test_db(dir: &tempfile::TempDir) -> Database {
    let config = DatabaseConfig {
        url: None,
        path: dir.path().join("test.db").to_string_lossy().into_owned(),
    };
    let db = Database::connect(&config).await.unwrap();
    db.run_migrations().await.unwrap();
    db
}

fn local_store(dir: &tempfile::TempDir) -> LocalStore {
    LocalStore::new(LocalStoreConfig {
        base_path: dir.path().join("uploads").to_string_lossy().into_owned(),
    })
}

fn admin() -> CurrentUser {
    CurrentUser {
        id: 1,
        username: "admin".to_string(),
        role: UserRole::Admin,
    }
}

fn student(username: &str) -> CurrentUser {
    CurrentUser {
        id: 2,
        username: username.to_string(),
        role: UserRole::Student,
    }
}

fn meta(subject: &str, semester: &str) -> UploadMeta {
    UploadMeta {
        subject: subject.to_string(),
        semester: semester.to_string(),
        category: "Study Material".to_string(),
        department: "General".to_string(),
        description: None,
    }
}

#[derive(Default)]
struct MockCounters {
    puts: usize,
    url_calls: usize,
    fetches: usize,
    deletes: usize,
    blobs: HashMap<String, Bytes>,
}

/// Strict mock backend: counts every facade call, serves blobs from
/// memory, and fails hard when handed a resource tag other than the one
/// it expects.
struct MockStore {
    tag_on_put: Option<String>,
    expected_tag: Mutex<Option<String>>,
    serve_urls: bool,
    counters: Mutex<MockCounters>,
}

impl MockStore {
    fn new(tag_on_put: Option<&str>, serve_urls: bool) -> Self {
        Self {
            tag_on_put: tag_on_put.map(str::to_string),
            expected_tag: Mutex::new(None),
            serve_urls,
            counters: Mutex::new(MockCounters::default()),
        }
    }

    fn expect_tag(&self, tag: &str) {
        *self.expected_tag.lock().unwrap() = Some(tag.to_string());
    }

    fn total_calls(&self) -> usize {
        let c = self.counters.lock().unwrap();
        c.puts + c.url_calls + c.fetches + c.deletes
    }

    fn delete_calls(&self) -> usize {
        self.counters.lock().unwrap().deletes
    }

    fn put_calls(&self) -> usize {
        self.counters.lock().unwrap().puts
    }

    fn check_tag(&self, resource_tag: Option<&str>) -> Result<(), AppError> {
        if let Some(expected) = self.expected_tag.lock().unwrap().as_deref() {
            if resource_tag != Some(expected) {
                return Err(AppError::Internal(format!(
                    "backend handed tag {:?}, expected {:?}",
                    resource_tag, expected
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MockStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let mut c = self.counters.lock().unwrap();
        c.puts += 1;
        c.blobs.insert(name.to_string(), data);
        Ok(self.tag_on_put.clone())
    }

    async fn resolve_url(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
        _disposition: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        self.counters.lock().unwrap().url_calls += 1;
        self.check_tag(resource_tag)?;
        if self.serve_urls {
            let tag = resource_tag.unwrap_or("none");
            Ok(Some(format!(
                "https://cdn.example/{}/{}?ext={}",
                tag, name, extension
            )))
        } else {
            Ok(None)
        }
    }

    async fn fetch_bytes(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<Bytes, AppError> {
        self.counters.lock().unwrap().fetches += 1;
        self.check_tag(resource_tag)?;
        let c = self.counters.lock().unwrap();
        c.blobs
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("blob {} missing", name)))
    }

    async fn delete(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<(), AppError> {
        let mut c = self.counters.lock().unwrap();
        c.deletes += 1;
        drop(c);
        self.check_tag(resource_tag)?;
        self.counters.lock().unwrap().blobs.remove(name);
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::CdnMedia
    }
}

#[tokio::test]
async fn upload_download_retire_end_to_end_on_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);
    let alice = student("alice");

    let payload = Bytes::from(vec![0x42u8; 2 * 1024 * 1024]);
    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &alice,
        "notes.pdf",
        Some("application/pdf"),
        payload.clone(),
        meta("Physics", "3"),
    )
    .await
    .unwrap();

    let record = CatalogService::get(&db, file_id).await.unwrap();
    assert_eq!(record.file_type, "pdf");
    assert_eq!(record.file_size, 2_097_152);
    assert_eq!(record.uploader_username, "alice");
    assert_eq!(record.original_filename, "notes.pdf");
    assert_ne!(record.stored_filename, "notes.pdf");
    assert!(record.stored_filename.ends_with(".pdf"));

    // Download streams the exact bytes under the original display name,
    // whatever the generated blob name was.
    match CatalogService::resolve_download(&db, &store, file_id)
        .await
        .unwrap()
    {
        ResolvedContent::Stream {
            data,
            content_type,
            disposition,
        } => {
            assert_eq!(data, payload);
            assert_eq!(content_type, "application/pdf");
            assert_eq!(disposition.as_deref(), Some("notes.pdf"));
        }
        ResolvedContent::Redirect(url) => panic!("expected streamed bytes, got redirect {}", url),
    }

    // A non-owner, non-admin caller cannot retire the file...
    let bob = student("bob");
    let err = CatalogService::retire(&db, &store, &bob, file_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));

    // ...and the record still resolves afterwards.
    assert!(CatalogService::resolve_view(&db, &store, file_id)
        .await
        .is_ok());

    // The uploader can retire it.
    let outcome = CatalogService::retire(&db, &store, &alice, file_id)
        .await
        .unwrap();
    assert!(outcome.blob_deleted);

    let err = CatalogService::get(&db, file_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Retiring twice yields NotFound the second time.
    let err = CatalogService::retire(&db, &store, &alice, file_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn admin_can_retire_files_they_did_not_upload() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);

    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "lab.txt",
        Some("text/plain"),
        Bytes::from_static(b"measurements"),
        meta("Chemistry", "2"),
    )
    .await
    .unwrap();

    CatalogService::retire(&db, &store, &admin(), file_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn retiring_missing_id_makes_no_backend_call() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = MockStore::new(None, true);

    let err = CatalogService::retire(&db, &store, &admin(), 9999)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.delete_calls(), 0);
}

#[tokio::test]
async fn forbidden_extensions_are_rejected_before_any_backend_or_db_call() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = MockStore::new(None, true);

    for filename in ["payload.zip", "tool.exe"] {
        let err = CatalogService::ingest_file(
            &db,
            &store,
            &student("alice"),
            filename,
            None,
            Bytes::from_static(b"blocked"),
            meta("Physics", "3"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    assert_eq!(store.put_calls(), 0);
    let files = CatalogService::list(&db, &CatalogFilter::default())
        .await
        .unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn oversize_upload_is_rejected_with_a_pointer_to_the_link_path() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = MockStore::new(None, true);

    let too_big = Bytes::from(vec![0u8; 30 * 1024 * 1024 + 1]);
    let err = CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "huge.pdf",
        None,
        too_big,
        meta("Physics", "3"),
    )
    .await
    .unwrap_err();

    match err {
        AppError::Validation(msg) => assert!(msg.contains("link")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(store.put_calls(), 0);
}

#[tokio::test]
async fn link_ingest_skips_the_blob_store_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = MockStore::new(None, true);

    let url = "https://drive.example.com/file/d/abc123/view";
    let file_id = CatalogService::ingest_link(&db, &student("alice"), url, meta("Maths", "1"))
        .await
        .unwrap();

    let record = CatalogService::get(&db, file_id).await.unwrap();
    assert_eq!(record.file_type, "link");
    assert_eq!(record.file_size, 0);
    assert_eq!(record.stored_filename, url);

    match CatalogService::resolve_view(&db, &store, file_id)
        .await
        .unwrap()
    {
        ResolvedContent::Redirect(target) => assert_eq!(target, url),
        ResolvedContent::Stream { .. } => panic!("link records must redirect"),
    }

    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn cdn_resource_tag_is_persisted_and_read_back_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;

    // The backend classifies the PDF as image-class on ingest.
    let store = MockStore::new(Some("image"), true);
    store.expect_tag("image");

    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "report.pdf",
        Some("application/pdf"),
        Bytes::from_static(b"%PDF-1.7 quarterly report"),
        meta("Economics", "5"),
    )
    .await
    .unwrap();

    let record = CatalogService::get(&db, file_id).await.unwrap();
    assert_eq!(record.resource_tag.as_deref(), Some("image"));

    match CatalogService::resolve_view(&db, &store, file_id)
        .await
        .unwrap()
    {
        ResolvedContent::Redirect(url) => assert!(url.contains("/image/")),
        ResolvedContent::Stream { .. } => panic!("expected redirect"),
    }

    // Rewrite the stored tag to raw-class: resolution must follow the
    // stored value, not re-derive from the extension (the extension guess
    // for a pdf would say image-class and the strict mock would reject it).
    db.execute(
        "UPDATE files SET resource_tag = ? WHERE id = ?",
        &["raw".into(), file_id.into()],
    )
    .await
    .unwrap();
    store.expect_tag("raw");

    match CatalogService::resolve_view(&db, &store, file_id)
        .await
        .unwrap()
    {
        ResolvedContent::Redirect(url) => assert!(url.contains("/raw/")),
        ResolvedContent::Stream { .. } => panic!("expected redirect"),
    }
}

#[tokio::test]
async fn roundtrip_is_byte_identical_through_a_streaming_backend() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    // URL-less backend: the catalog must fall back to streaming bytes.
    let store = MockStore::new(None, false);

    let payload = Bytes::from_static(b"slide deck contents");
    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "intro.pptx",
        None,
        payload.clone(),
        meta("Biology", "4"),
    )
    .await
    .unwrap();

    match CatalogService::resolve_download(&db, &store, file_id)
        .await
        .unwrap()
    {
        ResolvedContent::Stream {
            data, disposition, ..
        } => {
            assert_eq!(data, payload);
            assert_eq!(disposition.as_deref(), Some("intro.pptx"));
        }
        ResolvedContent::Redirect(_) => panic!("expected streamed bytes"),
    }
}

#[tokio::test]
async fn admin_ingest_emits_a_notification_and_student_ingest_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);

    CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "quiet.txt",
        None,
        Bytes::from_static(b"no broadcast"),
        meta("History", "1"),
    )
    .await
    .unwrap();
    assert!(NotificationService::latest(&db, 5).await.unwrap().is_empty());

    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &admin(),
        "syllabus.pdf",
        Some("application/pdf"),
        Bytes::from_static(b"%PDF-1.7 syllabus"),
        meta("Physics", "3"),
    )
    .await
    .unwrap();

    let notifications = NotificationService::latest(&db, 5).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("Physics"));
    assert_eq!(
        notifications[0].link.as_deref(),
        Some(format!("/files/{}", file_id).as_str())
    );
}

#[tokio::test]
async fn list_filters_by_text_subject_and_semester_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);
    let alice = student("alice");

    let first = CatalogService::ingest_file(
        &db,
        &store,
        &alice,
        "mechanics.pdf",
        None,
        Bytes::from_static(b"a"),
        meta("Physics", "3"),
    )
    .await
    .unwrap();
    let second = CatalogService::ingest_file(
        &db,
        &store,
        &alice,
        "algebra.pdf",
        None,
        Bytes::from_static(b"b"),
        meta("Maths", "3"),
    )
    .await
    .unwrap();
    let third =
        CatalogService::ingest_link(&db, &alice, "https://example.com/waves", meta("Physics", "5"))
            .await
            .unwrap();

    let all = CatalogService::list(&db, &CatalogFilter::default())
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|f| f.id).collect::<Vec<_>>(),
        vec![third, second, first]
    );

    let physics = CatalogService::list(
        &db,
        &CatalogFilter {
            subject: Some("Physics".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(physics.len(), 2);

    let semester3 = CatalogService::list(
        &db,
        &CatalogFilter {
            semester: Some("3".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(semester3.len(), 2);

    let by_text = CatalogService::list(
        &db,
        &CatalogFilter {
            q: Some("algebra".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].id, second);
}

#[tokio::test]
async fn comment_lifecycle_with_guest_identity_and_admin_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);

    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &student("alice"),
        "notes.txt",
        None,
        Bytes::from_static(b"notes"),
        meta("Physics", "3"),
    )
    .await
    .unwrap();

    // Anonymous with no name falls back to the default display name.
    CommentService::add(&db, file_id, None, None, None, "very helpful")
        .await
        .unwrap();
    // Named guest with a department.
    CommentService::add(&db, file_id, None, Some("Priya"), Some("CSE"), "thanks!")
        .await
        .unwrap();
    // Authenticated comment.
    let alice = student("alice");
    let own_comment = CommentService::add(&db, file_id, Some(&alice), None, None, "my upload")
        .await
        .unwrap();

    let comments = CommentService::list_for_file(&db, file_id).await.unwrap();
    assert_eq!(comments.len(), 3);
    assert!(comments
        .iter()
        .any(|c| c.display_name == "Anonymous Student" && c.user_id.is_none()));
    assert!(comments.iter().any(|c| c.display_name == "Priya (CSE)"));
    assert!(comments
        .iter()
        .any(|c| c.display_name == "alice" && c.user_id.is_some()));

    // Only an admin may delete a comment.
    let err = CommentService::delete(&db, &alice, own_comment)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));

    let parent = CommentService::delete(&db, &admin(), own_comment)
        .await
        .unwrap();
    assert_eq!(parent, file_id);
    assert_eq!(
        CommentService::list_for_file(&db, file_id).await.unwrap().len(),
        2
    );

    // Commenting on a missing file is a 404, before any insert.
    let err = CommentService::add(&db, 9999, None, None, None, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn base64_preview_round_trips_and_rejects_links() {
    use base64::Engine as _;

    let dir = tempfile::tempdir().unwrap();
    let db = test_db(&dir).await;
    let store = local_store(&dir);
    let alice = student("alice");

    let payload = Bytes::from_static(b"preview me");
    let file_id = CatalogService::ingest_file(
        &db,
        &store,
        &alice,
        "preview.txt",
        None,
        payload.clone(),
        meta("Physics", "3"),
    )
    .await
    .unwrap();

    let encoded = CatalogService::fetch_base64(&db, &store, file_id)
        .await
        .unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(Bytes::from(decoded), payload);

    let link_id =
        CatalogService::ingest_link(&db, &alice, "https://example.com/doc", meta("Physics", "3"))
            .await
            .unwrap();
    let err = CatalogService::fetch_base64(&db, &store, link_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
