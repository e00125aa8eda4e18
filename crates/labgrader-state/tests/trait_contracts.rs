//! Trait contract tests for Spreadsheet and SourceHost.
//!
//! These tests verify the behavioral contracts of the collaborator traits
//! using in-memory fakes. Any conforming implementation must pass these.

use chrono::{TimeZone, Utc};
use labgrader_state::fakes::{MemorySourceHost, MemorySpreadsheet};
use labgrader_state::*;

const BOOK: &str = "sheet-1";

// ===========================================================================
// Spreadsheet contract tests
// ===========================================================================

fn seeded_book() -> MemorySpreadsheet {
    let book = MemorySpreadsheet::new();
    book.add_sheet(BOOK, "4232");
    book.add_sheet(BOOK, "4233");
    book.put(BOOK, "4232", 4, 2, "ЛР1");
    book.put(BOOK, "4232", 5, 2, "ЛР2");
    book.put(BOOK, "4232", 2, 3, "Иванов Иван");
    book.put(BOOK, "4232", 2, 4, "Петров Пётр");
    book
}

#[tokio::test]
async fn list_groups_in_sheet_order() {
    let book = seeded_book();
    let groups = book.list_groups(BOOK).await.unwrap();

    assert_eq!(groups, vec!["4232".to_string(), "4233".to_string()]);
}

#[tokio::test]
async fn list_groups_unknown_spreadsheet_is_empty() {
    let book = seeded_book();

    assert!(book.list_groups("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn get_range_trims_trailing_empties() {
    let book = seeded_book();
    let range = A1Range::parse("4232!D2:AB2").unwrap();
    let rows = book.get_range(BOOK, &range).await.unwrap();

    assert_eq!(rows, vec![vec!["ЛР1".to_string(), "ЛР2".to_string()]]);
}

#[tokio::test]
async fn get_range_keeps_inner_gaps() {
    let book = seeded_book();
    book.put(BOOK, "4232", 7, 2, "ЛР4");
    let range = A1Range::row_span("4232", 2, 4, 28);
    let rows = book.get_range(BOOK, &range).await.unwrap();

    assert_eq!(rows[0], vec!["ЛР1", "ЛР2", "", "ЛР4"]);
}

#[tokio::test]
async fn get_range_missing_sheet() {
    let book = seeded_book();
    let err = book
        .get_range(BOOK, &A1Range::cell("9999", 1, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::SheetNotFound { .. }));
}

#[tokio::test]
async fn list_students_follows_layout() {
    let book = seeded_book();
    let students = book
        .list_students(BOOK, "4232", &SheetLayout::default())
        .await
        .unwrap();

    assert_eq!(students, vec!["Иванов Иван", "Петров Пётр"]);
}

#[tokio::test]
async fn set_cell_blind_write() {
    let book = seeded_book();
    book.set_cell(BOOK, "4232", 4, 3, "v", None).await.unwrap();

    assert_eq!(book.cell(BOOK, "4232", 4, 3).as_deref(), Some("v"));
    assert_eq!(book.writes().len(), 1);
}

#[tokio::test]
async fn set_cell_compare_matches_absent_as_empty() {
    let book = seeded_book();
    book.set_cell(BOOK, "4232", 3, 3, "octocat", Some(""))
        .await
        .unwrap();

    assert_eq!(book.cell(BOOK, "4232", 3, 3).as_deref(), Some("octocat"));
}

#[tokio::test]
async fn set_cell_compare_mismatch_leaves_cell() {
    let book = seeded_book();
    book.put(BOOK, "4232", 4, 3, "v-1");
    let err = book
        .set_cell(BOOK, "4232", 4, 3, "v", Some("?"))
        .await
        .unwrap_err();

    match err {
        GatewayError::CompareFailed {
            cell,
            expected,
            found,
        } => {
            assert_eq!(cell, "'4232'!D3");
            assert_eq!(expected, "?");
            assert_eq!(found, "v-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(book.cell(BOOK, "4232", 4, 3).as_deref(), Some("v-1"));
    assert!(book.writes().is_empty());
}

#[tokio::test]
async fn unavailable_backend_is_transport_error() {
    let book = seeded_book();
    book.set_unavailable(true);
    let err = book.list_groups(BOOK).await.unwrap_err();

    assert!(matches!(err, GatewayError::Transport { .. }));
}

// ===========================================================================
// SourceHost contract tests
// ===========================================================================

#[tokio::test]
async fn user_exists_is_case_insensitive() {
    let host = MemorySourceHost::new();
    host.add_user("OctoCat");

    assert!(host.user_exists("octocat").await.unwrap());
    assert!(!host.user_exists("ghost").await.unwrap());
}

#[tokio::test]
async fn get_repo_absent_is_none() {
    let host = MemorySourceHost::new();

    assert!(host.get_repo("org", "os-task1-octocat").await.unwrap().is_none());
    assert_eq!(host.repo_lookup_count(), 1);
}

#[tokio::test]
async fn runs_and_logs_round_trip() {
    let host = MemorySourceHost::new();
    let repo = host.add_repo("org", "os-task1-octocat", "abc");
    let at = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    let locator = host.add_run(
        &repo,
        "grade",
        "abc",
        WorkflowStatus::Completed,
        Some(at),
        "2024-05-10T11:59:00.0000000Z TASKID is 3\n",
    );

    let fetched = host.get_repo("org", "os-task1-octocat").await.unwrap().unwrap();
    assert_eq!(fetched.head_sha, "abc");

    let runs = host.list_workflow_runs(&fetched).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].logs, locator);
    assert_eq!(runs[0].completed_at, Some(at));

    let text = host.fetch_log_bundle(&locator).await.unwrap();
    assert!(text.contains("TASKID is 3"));
    assert_eq!(host.log_fetch_count(), 1);
}

#[tokio::test]
async fn missing_log_bundle_is_error() {
    let host = MemorySourceHost::new();
    let locator = LogLocator {
        owner: "org".to_string(),
        repo: "r".to_string(),
        run_id: 42,
    };

    assert!(host.fetch_log_bundle(&locator).await.is_err());
}
