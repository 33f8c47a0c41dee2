use course_duration::{
    Config, ConfigBuilder, DurationError, DurationService, ExclusionMatch, SnapshotPageFactory,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const URL: &str = "https://academy.wistia.com/folders/kq28owpl4k";

fn frame(body: &str) -> String {
    format!("<html><body><h1>Half Guard Mastery</h1>{}</body></html>", body)
}

fn section(name: &str, durations: &[&str]) -> String {
    let videos: String = durations
        .iter()
        .map(|d| format!("<div class='media'><span class='media-duration'>{}</span></div>", d))
        .collect();
    format!(
        "<section class='folder-section'><h2 class='folder-section-title'>{}</h2>{}</section>",
        name, videos
    )
}

/// Three frames: the first two end with a "Show more" button
fn revealing_course() -> Vec<String> {
    let preview = section("0.0 Course Preview", &["3:00"]);
    let intro = section("1.0 Introduction", &["4:05", "10:00"]);
    let sweeps = section("2.0 Sweeps", &["1:02:03"]);
    let files = section("Working Source Files", &["0:30"]);

    vec![
        frame(&format!("{}{}<button>Show more</button>", preview, intro)),
        frame(&format!("{}{}{}<button>Show   More</button>", preview, intro, sweeps)),
        frame(&format!("{}{}{}{}", preview, intro, sweeps, files)),
    ]
}

fn service(config: Config, factory: Arc<SnapshotPageFactory>) -> DurationService {
    DurationService::new(config, factory).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_with_reveal() {
    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let service = service(Config::default(), factory.clone());

    let consensus = assert_ok!(service.compute_duration(URL).await);
    let result = &consensus.result;

    assert_eq!(result.course_title, "Half Guard Mastery");
    assert_eq!(result.video_count, 3);
    assert_eq!(result.total_seconds, 245 + 600 + 3723);
    assert_eq!(result.total_seconds, result.sectioned_seconds());

    let names: Vec<_> = result.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["1.0 Introduction", "2.0 Sweeps"]);

    assert_eq!(consensus.diagnostics.total_runs, 3);
    assert_eq!(consensus.diagnostics.valid_runs, 3);
    assert_eq!(consensus.diagnostics.agreeing_runs, 3);

    let pages = factory.pages();
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|page| page.is_closed()));
    assert!(pages.iter().all(|page| page.current_frame() == 2));
}

#[tokio::test(start_paused = true)]
async fn test_majority_beats_partial_render() {
    // The second run never got past the first frame
    let partial = vec![frame(&section("1.0 Introduction", &["4:05"]))];
    let full = vec![frame(&section("1.0 Introduction", &["4:05", "10:00"]))];
    let factory = Arc::new(SnapshotPageFactory::per_run(vec![
        full.clone(),
        partial,
        full,
    ]));

    let consensus = assert_ok!(service(Config::default(), factory).compute_duration(URL).await);

    assert_eq!(consensus.result.video_count, 2);
    assert_eq!(consensus.result.total_seconds, 845);
    assert_eq!(consensus.diagnostics.agreeing_runs, 2);
    assert_eq!(consensus.diagnostics.selected_run, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_creates_no_pages() {
    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let service = service(Config::default(), factory.clone());

    let err = assert_err!(service.compute_duration("not-a-url").await);
    assert!(matches!(err, DurationError::InvalidUrl { .. }));
    assert!(factory.pages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_policy_rejects_other_hosts() {
    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let config = ConfigBuilder::new().with_required_host("wistia.com").build();

    let err = assert_err!(
        service(config, factory.clone())
            .compute_duration("https://example.com/folders/abc")
            .await
    );
    assert_eq!(err.kind(), "InvalidUrl");
    assert!(factory.pages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_login_redirect_fails_every_run() {
    let factory = Arc::new(
        SnapshotPageFactory::new(revealing_course())
            .with_redirect("https://academy.wistia.com/login?return_to=%2Ffolders"),
    );

    let err = assert_err!(service(Config::default(), factory.clone()).compute_duration(URL).await);

    match err {
        DurationError::ConsensusUnattainable { attempts, failures, .. } => {
            assert_eq!(attempts, 3);
            assert!(failures.contains("Authentication required"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(factory.pages().iter().all(|page| page.is_closed()));
}

#[tokio::test(start_paused = true)]
async fn test_page_without_videos_is_unattainable() {
    let factory = Arc::new(SnapshotPageFactory::new(vec![frame("<p>Nothing here yet</p>")]));

    let err = assert_err!(service(Config::default(), factory).compute_duration(URL).await);

    match err {
        DurationError::ConsensusUnattainable { attempts, failures, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(failures.matches("No video data found").count(), 3);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_exclusion() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("course-duration.toml");
    std::fs::write(
        &config_path,
        r#"
            [consensus]
            runs = 1

            [extraction]
            excluded_sections = ["Preview", "Sweeps"]
            exclusion_match = "substring"
        "#,
    )
    .unwrap();

    let config = Config::from_file(&config_path).unwrap();
    assert_eq!(config.extraction.exclusion_match, ExclusionMatch::Substring);

    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let consensus = assert_ok!(service(config, factory).compute_duration(URL).await);

    assert_eq!(consensus.diagnostics.total_runs, 1);
    assert_eq!(consensus.result.video_count, 3);
    assert_eq!(consensus.result.total_seconds, 245 + 600 + 30);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_closes_pages() {
    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let service = service(Config::default(), factory.clone());

    // Stabilization alone needs 2.5s, so this drops the request mid-run
    let outcome = tokio::time::timeout(Duration::from_secs(1), service.compute_duration(URL)).await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;

    let pages = factory.pages();
    assert!(!pages.is_empty());
    assert!(pages.iter().all(|page| page.is_closed()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let factory = Arc::new(SnapshotPageFactory::new(revealing_course()));
    let config = ConfigBuilder::new().with_runs(0).build();

    let err = DurationService::new(config, factory).err().unwrap();
    assert_eq!(err.kind(), "Config");
}
