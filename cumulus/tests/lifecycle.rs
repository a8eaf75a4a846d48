//! End-to-end tests for the image lifecycle and usage reporting, driven
//! through the public API the way the surrounding service uses it: observe
//! images, let the pipeline inspect them, challenge findings, and report
//! concurrent usage over the resulting runs.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use cumulus::api::models::{
    ConcurrentUsageParams, DailyConcurrentUsageResponse, ImageChallengePatch,
    MachineImageResponse, PaginatedResponse, Pagination,
};
use cumulus::image::{
    AnyImage, ChallengeField, ImageFilters, ImageKey, ImageStatus, InspectionResults, MachineImage,
};
use cumulus::storage::{ImageStore, InMemoryImageStore};
use cumulus::types::CloudProvider;
use cumulus::usage::{
    compute_daily_usage, normalize_runs, AggregationOptions, InstanceEvent, InstanceEventType, Run,
    RunDimensions,
};
use cumulus::Error;

fn key(id: &str) -> ImageKey {
    ImageKey::new(CloudProvider::Aws, id)
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 5, day, hour, minute, 0).unwrap()
}

fn rhel_results() -> InspectionResults {
    InspectionResults {
        rhel_enabled_repos_found: true,
        rhel_version: Some("7.6".to_string()),
        architecture: Some("x86_64".to_string()),
        syspurpose: Some(serde_json::json!({"role": "server", "sla": "premium"})),
        ..Default::default()
    }
}

fn x86() -> RunDimensions {
    RunDimensions {
        architecture: Some("x86_64".to_string()),
        ..Default::default()
    }
}

fn run(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Run {
    Run {
        instance_id: Uuid::new_v4(),
        dimensions: x86(),
        start_time: start,
        end_time: end,
    }
}

#[tokio::test]
async fn image_is_inspected_challenged_and_served() {
    let store = InMemoryImageStore::new();
    store
        .observe(MachineImage::observed(key("ami-e2e"), Some("prod worker".into())))
        .await
        .unwrap();

    // The inspection pipeline drives the record forward.
    store
        .advance_status(&key("ami-e2e"), ImageStatus::Preparing)
        .await
        .unwrap();
    store
        .advance_status(&key("ami-e2e"), ImageStatus::Inspecting)
        .await
        .unwrap();
    store
        .set_detection_result(&key("ami-e2e"), rhel_results())
        .await
        .unwrap();
    let inspected = store
        .advance_status(&key("ami-e2e"), ImageStatus::Inspected)
        .await
        .unwrap();
    assert!(inspected.rhel());

    // A customer disputes the finding; the PATCH body only ever carries
    // challenge flags.
    let patch = ImageChallengePatch {
        rhel_challenged: Some(true),
        openshift_challenged: None,
    };
    let mut updated = inspected;
    for (field, value) in patch.changes() {
        updated = store.set_challenge(&key("ami-e2e"), field, value).await.unwrap();
    }

    let response = MachineImageResponse::from(&updated);
    assert_eq!(response.status, ImageStatus::Inspected);
    assert!(response.rhel_detected);
    assert!(!response.rhel, "challenge must flip the detected value");
    assert_eq!(response.rhel_version.as_deref(), Some("7.6"));
}

#[tokio::test]
async fn double_challenge_restores_the_detected_value() {
    let store = InMemoryImageStore::new();
    store
        .observe(MachineImage::observed(key("ami-involution"), None))
        .await
        .unwrap();
    store
        .advance_status(&key("ami-involution"), ImageStatus::Preparing)
        .await
        .unwrap();
    store
        .advance_status(&key("ami-involution"), ImageStatus::Inspecting)
        .await
        .unwrap();
    store
        .set_detection_result(&key("ami-involution"), rhel_results())
        .await
        .unwrap();

    let challenged = store
        .set_challenge(&key("ami-involution"), ChallengeField::Rhel, true)
        .await
        .unwrap();
    assert!(!challenged.rhel());

    // Re-asserting the same challenge is idempotent.
    let challenged_again = store
        .set_challenge(&key("ami-involution"), ChallengeField::Rhel, true)
        .await
        .unwrap();
    assert!(!challenged_again.rhel());

    // Withdrawing it restores the originally detected value.
    let withdrawn = store
        .set_challenge(&key("ami-involution"), ChallengeField::Rhel, false)
        .await
        .unwrap();
    assert!(withdrawn.rhel());
}

#[tokio::test]
async fn terminal_images_stay_terminal() {
    let store = InMemoryImageStore::new();
    for (id, terminal) in [
        ("ami-t1", ImageStatus::Error),
        ("ami-t2", ImageStatus::Unavailable),
    ] {
        store
            .observe(MachineImage::observed(key(id), None))
            .await
            .unwrap();
        store.advance_status(&key(id), terminal).await.unwrap();

        for target in [
            ImageStatus::Pending,
            ImageStatus::Preparing,
            ImageStatus::Inspecting,
            ImageStatus::Inspected,
        ] {
            let err = store.advance_status(&key(id), target).await.unwrap_err();
            assert!(matches!(err, Error::InvalidTransition { .. }));
        }
    }
}

#[tokio::test]
async fn typed_pipeline_path_matches_dynamic_path() {
    let store = InMemoryImageStore::new();
    let image = MachineImage::observed(key("ami-typed"), None);
    store.observe(image.clone()).await.unwrap();

    let inspected = image
        .prepare(&store)
        .await
        .unwrap()
        .inspect(&store)
        .await
        .unwrap()
        .record_results(rhel_results(), &store)
        .await
        .unwrap()
        .complete(&store)
        .await
        .unwrap();
    assert!(inspected.state.results.is_some());

    let stored = store.get(&key("ami-typed")).await.unwrap();
    assert_eq!(stored.status(), ImageStatus::Inspected);
    assert!(stored.rhel());
}

#[tokio::test]
async fn image_list_pages_into_the_envelope() {
    let store = InMemoryImageStore::new();
    for id in ["ami-p1", "ami-p2", "ami-p3"] {
        store
            .observe(MachineImage::observed(key(id), None))
            .await
            .unwrap();
    }

    let pagination = Pagination {
        offset: Some(0),
        limit: Some(2),
    };
    let (page, total) = store
        .list(&ImageFilters::default(), pagination.offset(), pagination.limit())
        .await
        .unwrap();
    let data: Vec<MachineImageResponse> = page.iter().map(MachineImageResponse::from).collect();
    let base = url::Url::parse("https://api.example.com/v2/images/?limit=2").unwrap();
    let response = PaginatedResponse::new(&base, data, total, &pagination);

    assert_eq!(response.meta.count, 3);
    assert_eq!(response.data.len(), 2);
    assert!(response.links.next.is_some());
    assert!(response.links.previous.is_none());
}

#[test]
fn events_to_runs_to_daily_report() {
    let instance = Uuid::new_v4();
    let events = vec![
        InstanceEvent {
            instance_id: instance,
            event_type: InstanceEventType::PowerOn,
            occurred_at: at(1, 9, 0),
        },
        // A spurious second start must not open a second run.
        InstanceEvent {
            instance_id: instance,
            event_type: InstanceEventType::PowerOn,
            occurred_at: at(1, 9, 30),
        },
        InstanceEvent {
            instance_id: instance,
            event_type: InstanceEventType::PowerOff,
            occurred_at: at(2, 9, 0),
        },
    ];
    let mut dimensions = HashMap::new();
    dimensions.insert(instance, x86());

    let runs = normalize_runs(&events, &dimensions);
    assert_eq!(runs.len(), 1);

    let report = compute_daily_usage(
        &runs,
        date(2019, 5, 1),
        date(2019, 5, 4),
        &AggregationOptions::default(),
    )
    .unwrap();
    assert_eq!(report.len(), 3);
    // Running on the 1st and into the 2nd, gone on the 3rd.
    assert_eq!(report[0].maximum_counts[0].instance_count, 1);
    assert_eq!(report[1].maximum_counts[0].instance_count, 1);
    assert!(report[2].maximum_counts.is_empty());
}

#[test]
fn runs_meeting_at_a_boundary_peak_at_one() {
    // Same-dimension runs meeting exactly at 11:00: intervals are
    // half-open, so the first has released its slot when the second
    // starts.
    let runs = vec![
        run(at(1, 9, 0), Some(at(1, 11, 0))),
        run(at(1, 11, 0), Some(at(1, 13, 0))),
    ];
    let report = compute_daily_usage(
        &runs,
        date(2019, 5, 1),
        date(2019, 5, 2),
        &AggregationOptions::default(),
    )
    .unwrap();
    assert_eq!(report[0].maximum_counts[0].instance_count, 1);
}

#[test]
fn report_range_round_trips_through_the_api_models() {
    let params: ConcurrentUsageParams =
        serde_json::from_str(r#"{"start_date": "2019-05-01", "end_date": "2019-05-03"}"#).unwrap();
    let (start, end) = params.resolve(date(2019, 6, 1)).unwrap();

    let runs = vec![run(at(1, 9, 0), Some(at(1, 12, 0))), run(at(1, 10, 0), Some(at(1, 11, 0)))];
    let report = compute_daily_usage(&runs, start, end, &AggregationOptions::default()).unwrap();
    let days: Vec<DailyConcurrentUsageResponse> = report
        .into_iter()
        .map(DailyConcurrentUsageResponse::from)
        .collect();

    assert_eq!(days.len(), 2);
    let json = serde_json::to_value(&days[0]).unwrap();
    assert_eq!(json["date"], "2019-05-01");
    assert_eq!(json["maximum_counts"][0]["arch"], "x86_64");
    assert_eq!(json["maximum_counts"][0]["instance_count"], 2);
    assert_eq!(serde_json::to_value(&days[1]).unwrap()["maximum_counts"], serde_json::json!([]));
}

#[test]
fn summed_dimension_counts_stay_within_distinct_instances() {
    let arm = RunDimensions {
        architecture: Some("arm64".to_string()),
        ..Default::default()
    };
    let runs = vec![
        run(at(1, 1, 0), Some(at(1, 5, 0))),
        run(at(1, 2, 0), Some(at(1, 6, 0))),
        Run {
            instance_id: Uuid::new_v4(),
            dimensions: arm,
            start_time: at(1, 3, 0),
            end_time: Some(at(1, 4, 0)),
        },
    ];
    let report = compute_daily_usage(
        &runs,
        date(2019, 5, 1),
        date(2019, 5, 2),
        &AggregationOptions::default(),
    )
    .unwrap();
    let total: u32 = report[0]
        .maximum_counts
        .iter()
        .map(|c| c.instance_count)
        .sum();
    assert!(total <= 3);
}

#[tokio::test]
async fn reinspected_image_walks_the_lifecycle_again() {
    let store = InMemoryImageStore::new();
    store
        .observe(MachineImage::observed(key("ami-again"), None))
        .await
        .unwrap();
    store
        .advance_status(&key("ami-again"), ImageStatus::Error)
        .await
        .unwrap();

    let reset = store.reinspect(&key("ami-again")).await.unwrap();
    assert_eq!(reset.status(), ImageStatus::Pending);

    // Forward progression works again after the reset.
    let preparing = store
        .advance_status(&key("ami-again"), ImageStatus::Preparing)
        .await
        .unwrap();
    assert_eq!(preparing.status(), ImageStatus::Preparing);
}

#[tokio::test]
async fn observed_images_start_pending() {
    let store = InMemoryImageStore::new();
    store
        .observe(MachineImage::observed(key("ami-new"), None))
        .await
        .unwrap();
    let stored = store.get(&key("ami-new")).await.unwrap();
    assert!(matches!(stored, AnyImage::Pending(_)));
    assert!(!stored.is_terminal());
}
