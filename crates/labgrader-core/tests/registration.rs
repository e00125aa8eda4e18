//! Registration flow: binding GitHub handles to roster rows.

use std::sync::Arc;

use labgrader_core::{
    CellLocks, CourseDefinition, ErrorClass, GradeError, LabDefinition, Registrar,
    RegistrationRequest, RejectionKind, SheetLayout,
};
use labgrader_state::{MemorySourceHost, MemorySpreadsheet};

const SHEET: &str = "roster-2024";
const GROUP: &str = "4232";
const GITHUB_COL: u32 = 3;

fn setup() -> (Arc<MemorySpreadsheet>, Arc<MemorySourceHost>, Registrar) {
    let sheets = Arc::new(MemorySpreadsheet::new());
    sheets.put(SHEET, GROUP, 2, 3, "Ivanov Ivan Ivanovich");
    sheets.put(SHEET, GROUP, 2, 4, "Petrov Petr");
    sheets.put(SHEET, GROUP, GITHUB_COL, 4, "hubot");
    sheets.add_sheet(SHEET, "4233");

    let host = Arc::new(MemorySourceHost::new());
    host.add_user("octocat");
    host.add_user("hubot");
    host.add_user("monalisa");

    let course = CourseDefinition {
        name: "Operating Systems".to_string(),
        semester: "Spring 2024".to_string(),
        timezone: "UTC+3".to_string(),
        github_org: "suai-os-2024".to_string(),
        spreadsheet_id: SHEET.to_string(),
        layout: SheetLayout::default(),
        labs: vec![LabDefinition::new("ЛР1", "os-task1")],
    };
    let registrar = Registrar::new(sheets.clone(), host.clone(), Arc::new(course));
    (sheets, host, registrar)
}

#[tokio::test]
async fn test_register_writes_handle() {
    let (sheets, _host, registrar) = setup();

    let report = registrar
        .register(&RegistrationRequest::new(
            GROUP,
            "ivanov  ivan ivanovich",
            " octocat ",
        ))
        .await
        .unwrap();

    assert_eq!(report.row, 3);
    assert_eq!(report.cell, "'4232'!C3");
    assert_eq!(report.github, "octocat");
    assert_eq!(sheets.cell(SHEET, GROUP, GITHUB_COL, 3).as_deref(), Some("octocat"));
}

#[tokio::test]
async fn test_repeat_registration_is_duplicate() {
    let (sheets, _host, registrar) = setup();

    let err = registrar
        .register(&RegistrationRequest::new(GROUP, "Petrov Petr", "hubot"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), RejectionKind::DuplicateSameValue);
    assert_eq!(err.class(), ErrorClass::Conflict);
    assert!(sheets.writes().is_empty());
}

#[tokio::test]
async fn test_claimed_row_is_not_overwritten() {
    let (sheets, _host, registrar) = setup();

    let err = registrar
        .register(&RegistrationRequest::new(GROUP, "Petrov Petr", "monalisa"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GradeError::AlreadyClaimed {
            existing: "hubot".to_string()
        }
    );
    assert_eq!(sheets.cell(SHEET, GROUP, GITHUB_COL, 4).as_deref(), Some("hubot"));
}

#[tokio::test]
async fn test_unknown_github_user() {
    let (sheets, _host, registrar) = setup();

    let err = registrar
        .register(&RegistrationRequest::new(GROUP, "Ivanov Ivan Ivanovich", "nobody"))
        .await
        .unwrap_err();

    assert_eq!(err, GradeError::UserNotFound("nobody".to_string()));
    assert!(sheets.writes().is_empty());
}

#[tokio::test]
async fn test_unknown_student_or_group() {
    let (_sheets, host, registrar) = setup();

    let err = registrar
        .register(&RegistrationRequest::new(GROUP, "Sidorov Sidor", "octocat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RejectionKind::StudentNotFound);

    let err = registrar
        .register(&RegistrationRequest::new("9999", "Petrov Petr", "octocat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RejectionKind::GroupNotFound);

    let err = registrar
        .register(&RegistrationRequest::new("4233", "Petrov Petr", "octocat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RejectionKind::StudentNotFound);

    host.set_unavailable(true);
    let err = registrar
        .register(&RegistrationRequest::new(GROUP, "Ivanov Ivan Ivanovich", "octocat"))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_racing_registrations_claim_once() {
    let (sheets, _host, registrar) = setup();
    let registrar = Arc::new(registrar.with_cell_locks(Arc::new(CellLocks::new())));

    let handles: Vec<_> = ["octocat", "monalisa"]
        .into_iter()
        .map(|github| {
            let registrar = registrar.clone();
            tokio::spawn(async move {
                registrar
                    .register(&RegistrationRequest::new(GROUP, "Ivanov Ivan Ivanovich", github))
                    .await
            })
        })
        .collect();

    let mut claimed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => claimed += 1,
            Err(err) => assert_eq!(err.kind(), RejectionKind::AlreadyClaimed),
        }
    }

    assert_eq!(claimed, 1);
    assert_eq!(sheets.writes().len(), 1);
}
