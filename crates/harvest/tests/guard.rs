mod common;

use common::*;
use syllabus_core::PortalSession;
use syllabus_harvest::SessionGuard;

fn semesters() -> Vec<FakeSemester> {
    vec![FakeSemester::new(
        "Fall 2024",
        vec![FakeCategory::new(
            "Core",
            vec![FakeRow::course("CS101", &file_url("abc.pdf"), "2024-08-01")],
        )],
    )]
}

#[tokio::test]
async fn test_guard_is_noop_on_healthy_session() {
    let config = test_config();
    let mut portal = FakePortal::new(&config, semesters()).on_tool_page();
    let before = portal.generation();

    let outcome = SessionGuard::new(&config).ensure(&mut portal).await;

    assert!(outcome.was_noop());
    assert_eq!(portal.generation(), before);
    assert_eq!(portal.logins, 0);
}

#[tokio::test]
async fn test_guard_logs_back_in_after_expiry() {
    let config = test_config();
    let mut portal = FakePortal::new(&config, semesters()).on_tool_page();
    portal.expire_session();

    let outcome = SessionGuard::new(&config).ensure(&mut portal).await;

    assert!(outcome.reauthenticated);
    assert!(!outcome.renavigated);
    assert!(outcome.error.is_none());
    assert_eq!(portal.page, Page::Tool);
    assert!(portal.logged_in);
}

#[tokio::test]
async fn test_guard_returns_to_tool_page() {
    let config = test_config();
    let mut portal = FakePortal::new(&config, semesters()).on_tool_page();
    portal.page = Page::Landing;

    let outcome = SessionGuard::new(&config).ensure(&mut portal).await;

    assert!(outcome.renavigated);
    assert!(!outcome.reauthenticated);
    assert_eq!(portal.page, Page::Tool);
}

#[tokio::test]
async fn test_guard_handles_redirect_to_login() {
    let config = test_config();
    let mut portal = FakePortal::new(&config, semesters());

    let outcome = SessionGuard::new(&config).ensure(&mut portal).await;

    assert!(outcome.renavigated);
    assert!(outcome.reauthenticated);
    assert_eq!(portal.page, Page::Tool);
    assert_eq!(portal.logins, 1);
}

#[tokio::test]
async fn test_guard_is_idempotent() {
    let config = test_config();
    let mut portal = FakePortal::new(&config, semesters());
    let guard = SessionGuard::new(&config);

    guard.ensure(&mut portal).await;
    let second = guard.ensure(&mut portal).await;

    assert!(second.was_noop());
    assert_eq!(portal.logins, 1);
}

#[tokio::test]
async fn test_guard_survives_rejected_credentials() {
    let mut config = test_config();
    config.credentials.password = "wrong".to_string();
    let mut portal = FakePortal::new(&test_config(), semesters()).on_tool_page();
    portal.expire_session();

    let outcome = SessionGuard::new(&config).ensure(&mut portal).await;

    assert!(!portal.logged_in);
    assert_eq!(portal.page, Page::Login);
    assert!(outcome.reauthenticated);
}
