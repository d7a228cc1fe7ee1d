mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;

use common::{MockFtp, MockHttp, SlowHttp, WORKBENCH_DATA, WORKBENCH_REST, pipeline};
use metabo_datasets::domain::{AccessionCode, ArtifactKind};
use metabo_datasets::error::MetaboError;
use metabo_datasets::pipeline::CacheOutcome;
use metabo_datasets::repository::Deadline;

const STUDY_JSON: &str = include_str!("fixtures/ST000025.json");
const MWTAB: &str = "#METABOLOMICS WORKBENCH STUDY_ID:ST000025 ANALYSIS_ID:AN000050\n\
ST:STUDY_TITLE\tPlasma metabolites after acute injury\n";

fn analysis_url(study: &str) -> String {
    format!("{WORKBENCH_REST}/study/study_id/{study}/analysis")
}

fn study_http() -> MockHttp {
    MockHttp::default()
        .ok(
            &analysis_url("ST000025"),
            r#"{"study_id":"ST000025","analysis_id":"AN000050","analysis_type":"MS"}"#,
        )
        .ok(
            &format!("{WORKBENCH_DATA}?JSON=YES&STUDY_ID=ST000025&ANALYSIS_ID=AN000050&MODE=d"),
            STUDY_JSON,
        )
        .ok(
            &format!("{WORKBENCH_DATA}?STUDY_ID=ST000025&ANALYSIS_ID=AN000050&MODE=d"),
            MWTAB,
        )
}

#[test]
fn fetch_then_parse_study() {
    let temp = tempfile::tempdir().unwrap();
    let http = Arc::new(study_http());
    let ftp = Arc::new(MockFtp::default());
    let pipeline = pipeline(temp.path(), http.clone(), ftp.clone());

    let record = pipeline.get_dataset("ST000025").unwrap();
    assert_eq!(record.accession, "ST000025");
    assert_eq!(record.analysis_id.as_deref(), Some("AN000050"));
    assert_eq!(
        record.title.as_deref(),
        Some("Plasma metabolites after acute injury")
    );
    assert_eq!(
        record.description.as_deref(),
        Some("Time course of plasma metabolites in an injury model.")
    );
    assert_eq!(record.metabolites, vec!["alanine", "glycine", "lactic acid"]);
    assert!(record.rawdata_filenames.is_empty());

    assert_eq!(http.calls().len(), 3);
    assert_eq!(ftp.connects(), 0);

    let acc: AccessionCode = "ST000025".parse().unwrap();
    assert_eq!(
        pipeline.store().list_files(&acc).unwrap(),
        vec!["ST000025.json", "ST000025.mwtab.txt"]
    );
}

#[test]
fn record_serializes_with_boundary_keys() {
    let temp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(temp.path(), Arc::new(study_http()), Arc::new(MockFtp::default()));
    let record = pipeline.get_dataset("ST000025").unwrap();

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["Title"], "Plasma metabolites after acute injury");
    assert_eq!(value["analysis_id"], "AN000050");
    assert_eq!(value["Metabolites"][2], "lactic acid");
    assert_eq!(value["Rawdata"], serde_json::json!([]));
    assert_eq!(value["repository"], "metabolomics-workbench");
}

#[test]
fn unknown_analysis_is_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let http = Arc::new(MockHttp::default().ok(&analysis_url("ST999999"), "[]"));
    let pipeline = pipeline(temp.path(), http.clone(), Arc::new(MockFtp::default()));

    let err = pipeline.acquire("ST999999", Deadline::none()).unwrap_err();
    assert_matches!(err, MetaboError::MissingArtifact(_));
    assert_eq!(http.calls().len(), 1);

    let acc: AccessionCode = "ST999999".parse().unwrap();
    assert!(!pipeline.store().exists(&acc));
    assert_matches!(
        pipeline.get_dataset("ST999999"),
        Err(MetaboError::DatasetNotFound(_))
    );
}

#[test]
fn missing_metabolite_section_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let http = Arc::new(MockHttp::default());
    let pipeline = pipeline(temp.path(), http.clone(), Arc::new(MockFtp::default()));

    let acc: AccessionCode = "ST000030".parse().unwrap();
    let store = pipeline.store();
    store
        .write(
            &acc,
            "ST000030.json",
            br#"{"METABOLOMICS WORKBENCH": {}, "STUDY": {"STUDY_TITLE": "NMR study"}}"#,
        )
        .unwrap();
    store
        .write_manifest(&acc, vec!["ST000030.json".to_string()])
        .unwrap();

    let err = pipeline.acquire("ST000030", Deadline::none()).unwrap_err();
    assert_matches!(err, MetaboError::MissingJsonKey { key, .. } if key == "MS_METABOLITE_DATA");
    assert!(http.calls().is_empty());
}

#[test]
fn mwtab_is_the_download_artifact() {
    let temp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(temp.path(), Arc::new(study_http()), Arc::new(MockFtp::default()));
    pipeline.get_dataset("ST000025").unwrap();

    for kind in [ArtifactKind::Metadata, ArtifactKind::Rawdata] {
        let (name, _) = pipeline.open_artifact("ST000025", kind).unwrap();
        assert_eq!(name, "ST000025.mwtab.txt");
    }
}

#[test]
fn waiting_caller_honours_its_deadline() {
    let temp = tempfile::tempdir().unwrap();
    let http = Arc::new(SlowHttp {
        inner: study_http(),
        delay: Duration::from_millis(400),
    });
    let pipeline = pipeline(temp.path(), http, Arc::new(MockFtp::default()));

    thread::scope(|scope| {
        let first = scope.spawn(|| pipeline.get_dataset("ST000025"));
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let err = pipeline
            .acquire("ST000025", Deadline::after(Duration::from_millis(50)))
            .unwrap_err();
        assert_matches!(err, MetaboError::DeadlineExceeded(_));
        assert!(started.elapsed() < Duration::from_millis(600));

        let record = first.join().unwrap().unwrap();
        assert_eq!(record.analysis_id.as_deref(), Some("AN000050"));
    });

    let (_, outcome) = pipeline
        .acquire_with_outcome("ST000025", Deadline::after(Duration::from_millis(50)))
        .unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
}
