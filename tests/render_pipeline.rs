mod support;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use pdfoid::{
    application::render::RenderError,
    domain::request::{RenderRequest, WaitFor},
};
use tokio::sync::Notify;

use support::{FakeLauncher, FakeMetadataTool, Harness, MarkerBehaviour, SAMPLE_PDF};

fn report_request() -> RenderRequest {
    RenderRequest::new("Report", "<html><body><h1>Q3</h1></body></html>")
}

#[tokio::test]
async fn renders_pdf_and_stamps_title() {
    let harness = Harness::new(FakeLauncher::default());

    let result = harness.backend.render(&report_request()).await.expect("render");

    assert!(result.pdf.starts_with(b"%PDF-"));
    assert_eq!(result.pdf, SAMPLE_PDF);
    assert_eq!(harness.metadata.titles(), vec!["Report".to_string()]);
    assert_eq!(
        harness.launcher.loaded_html(),
        vec!["<html><body><h1>Q3</h1></body></html>".to_string()]
    );
}

#[tokio::test]
async fn output_is_complete_before_annotation() {
    let harness = Harness::new(FakeLauncher::default());

    harness.backend.render(&report_request()).await.expect("render");

    assert_eq!(harness.metadata.observed(), vec![SAMPLE_PDF.to_vec()]);
}

#[tokio::test]
async fn footer_placeholders_reach_print_command() {
    let harness = Harness::new(FakeLauncher::default());
    let request = report_request()
        .with_header_template("<div>Header</div>")
        .with_footer_template("{page_number}/{total_pages}");

    harness.backend.render(&request).await.expect("render");

    let configs = harness.launcher.print_configs();
    assert_eq!(configs.len(), 1);
    assert!(configs[0].print_background);
    assert!(configs[0].display_header_footer);
    assert_eq!(configs[0].header_template, "<div>Header</div>");
    assert_eq!(
        configs[0].footer_template,
        r#"<span class="pageNumber"></span>/<span class="totalPages"></span>"#
    );
}

#[tokio::test]
async fn identical_requests_render_in_separate_workspaces() {
    let harness = Harness::new(FakeLauncher::default());

    let first = harness.backend.render(&report_request()).await.expect("first");
    let second = harness.backend.render(&report_request()).await.expect("second");

    assert!(first.pdf.starts_with(b"%PDF-"));
    assert!(second.pdf.starts_with(b"%PDF-"));
    let workspaces = harness.launcher.workspaces();
    assert_eq!(workspaces.len(), 2);
    assert_ne!(workspaces[0], workspaces[1]);
    assert_eq!(harness.launcher.launches(), 2);
}

#[tokio::test]
async fn ready_marker_lets_render_proceed() {
    let harness = Harness::new(FakeLauncher::default().with_marker(MarkerBehaviour::Present));
    let request = report_request()
        .with_wait_for(WaitFor::new("math-loaded", Duration::from_secs(10)).expect("wait_for"));

    let result = harness.backend.render(&request).await.expect("render");
    assert!(result.pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn missing_marker_times_out_with_log() {
    let harness = Harness::new(FakeLauncher::default().with_marker(MarkerBehaviour::Absent));
    let request = RenderRequest::new("Report", "<html><body><p>no marker here</p></body></html>")
        .with_wait_for(WaitFor::new("math-loaded", Duration::from_secs(1)).expect("wait_for"));

    let started = Instant::now();
    let err = harness.backend.render(&request).await.expect_err("timeout");
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(6), "took {elapsed:?}");
    assert!(matches!(err, RenderError::Timeout { .. }));
    let message = err.to_string();
    assert!(message.contains("timed out"), "{message}");
    assert!(message.contains("console: waiting for math"), "{message}");
    assert!(harness.metadata.titles().is_empty());
}

#[tokio::test]
async fn unresponsive_surface_is_bounded_by_grace_period() {
    let harness = Harness::new(FakeLauncher::default().with_marker(MarkerBehaviour::Hang));
    let request = report_request()
        .with_wait_for(WaitFor::new("math-loaded", Duration::from_secs(1)).expect("wait_for"));

    let started = Instant::now();
    let err = harness.backend.render(&request).await.expect_err("timeout");

    assert!(started.elapsed() < Duration::from_secs(8));
    assert_eq!(err.kind(), "timeout");
    assert_eq!(harness.launcher.shutdowns(), 1);
}

#[tokio::test]
async fn empty_print_response_is_a_print_error() {
    let harness = Harness::new(FakeLauncher::default().with_payload(None));

    let err = harness.backend.render(&report_request()).await.expect_err("print");

    assert!(matches!(err, RenderError::Print { .. }));
    let message = err.to_string();
    assert!(message.starts_with("no response from PDF printer"), "{message}");
    assert!(message.contains("chromedriver started"), "{message}");

    let harness = Harness::new(FakeLauncher::default().with_payload(Some(String::new())));
    let err = harness.backend.render(&report_request()).await.expect_err("print");
    assert_eq!(err.kind(), "print");
}

#[tokio::test]
async fn undecodable_print_payload_is_a_print_error() {
    let harness =
        Harness::new(FakeLauncher::default().with_payload(Some("not base64!".to_string())));

    let err = harness.backend.render(&report_request()).await.expect_err("payload");
    assert!(matches!(err, RenderError::PrintPayload(_)));
    assert_eq!(err.kind(), "print");
}

#[tokio::test]
async fn metadata_failure_carries_tool_output() {
    let harness = Harness::with(
        FakeLauncher::default(),
        FakeMetadataTool::failing("Error: File format error - output.pdf"),
        4,
        Duration::from_secs(5),
    );

    let err = harness.backend.render(&report_request()).await.expect_err("metadata");

    assert!(matches!(err, RenderError::Metadata { .. }));
    assert!(err.to_string().contains("File format error"));
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn launch_failure_surfaces_without_shutdown() {
    let harness = Harness::new(FakeLauncher::default().failing_launch());

    let err = harness.backend.render(&report_request()).await.expect_err("launch");

    assert_eq!(err.kind(), "surface");
    assert!(err.to_string().contains("no browser available"));
    assert_eq!(harness.launcher.shutdowns(), 0);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn surface_is_shut_down_on_every_outcome() {
    let ok = Harness::new(FakeLauncher::default());
    ok.backend.render(&report_request()).await.expect("render");
    assert_eq!(ok.launcher.shutdowns(), 1);

    let print = Harness::new(FakeLauncher::default().with_payload(None));
    print.backend.render(&report_request()).await.expect_err("print");
    assert_eq!(print.launcher.shutdowns(), 1);

    let timeout = Harness::new(FakeLauncher::default().with_marker(MarkerBehaviour::Absent));
    let request = report_request()
        .with_wait_for(WaitFor::new("ready", Duration::ZERO).expect("wait_for"));
    timeout.backend.render(&request).await.expect_err("timeout");
    assert_eq!(timeout.launcher.shutdowns(), 1);
}

#[tokio::test]
async fn workspace_is_removed_after_every_call() {
    let ok = Harness::new(FakeLauncher::default());
    ok.backend.render(&report_request()).await.expect("render");
    assert_eq!(ok.leftover_workspaces(), 0);
    for dir in ok.launcher.workspaces() {
        assert!(!dir.exists());
    }

    let failed = Harness::new(FakeLauncher::default().with_payload(None));
    failed.backend.render(&report_request()).await.expect_err("print");
    assert_eq!(failed.leftover_workspaces(), 0);
}

#[tokio::test]
async fn cancelled_render_releases_workspace() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::new(FakeLauncher::default().with_print_gate(gate));

    let backend = Arc::clone(&harness.backend);
    let task = tokio::spawn(async move { backend.render(&report_request()).await });
    wait_for_launches(&harness.launcher, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.leftover_workspaces(), 1);

    task.abort();
    let _ = task.await;

    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn saturated_backend_reports_busy() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::with(
        FakeLauncher::default().with_print_gate(Arc::clone(&gate)),
        FakeMetadataTool::default(),
        1,
        Duration::from_millis(200),
    );

    let backend = Arc::clone(&harness.backend);
    let first = tokio::spawn(async move { backend.render(&report_request()).await });
    wait_for_launches(&harness.launcher, 1).await;

    let err = harness
        .backend
        .render(&report_request())
        .await
        .expect_err("busy");
    assert!(matches!(err, RenderError::Busy { .. }));
    assert_eq!(err.kind(), "resource");
    assert_eq!(harness.launcher.launches(), 1);

    gate.notify_one();
    let result = first.await.expect("join").expect("first render");
    assert!(result.pdf.starts_with(b"%PDF-"));
}

async fn wait_for_launches(launcher: &FakeLauncher, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while launcher.launches() < expected {
        assert!(Instant::now() < deadline, "launch did not happen in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
