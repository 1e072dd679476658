use std::sync::Arc;

use mzfeatures::{
    recalculate_derived_attributes, CenterMeasure, Feature, FeatureList, FeatureListRow,
    IonTimeSeries, MZTolerance, RTTolerance, RawDataFile, RawFileId, RowId, Scan,
};
use mzfeatures_align::{
    AlignmentError, CancellationToken, JoinAligner, JoinAlignerParams, ProgressCounter, TaskStatus,
};

fn make_raw(id: u32) -> Arc<RawDataFile> {
    // one scan every 0.01 minutes up to 12 minutes
    let scans = (0..1200u32)
        .map(|i| Scan::new(i, i as f32 * 0.01, 1))
        .collect();
    Arc::new(RawDataFile::new(RawFileId(id), format!("sample-{id}.mzML"), scans))
}

fn make_feature(raw: &Arc<RawDataFile>, mz: f64, rt: f32) -> Feature {
    let apex = (rt / 0.01).round() as u32;
    let scans: Vec<u32> = (apex - 3..=apex + 3).collect();
    let intensities = vec![10.0, 50.0, 200.0, 1000.0, 200.0, 50.0, 10.0];
    let series = IonTimeSeries::from_scans(raw.as_ref(), scans, vec![mz; 7], intensities).unwrap();
    let mut feature = Feature::new(raw.clone(), series);
    recalculate_derived_attributes(&mut feature, CenterMeasure::Avg);
    feature
}

fn make_list(raw: Arc<RawDataFile>, name: &str, rows: &[(u32, f64, f32)]) -> FeatureList {
    let mut list = FeatureList::new(name.to_string(), vec![raw.clone()]).unwrap();
    for (id, mz, rt) in rows {
        list.add_row(FeatureListRow::new(RowId(*id)).with_feature(make_feature(&raw, *mz, *rt)))
            .unwrap();
    }
    list
}

fn params() -> JoinAlignerParams {
    JoinAlignerParams {
        list_name: "aligned".into(),
        mz_tolerance: MZTolerance::new(0.005, 10.0),
        rt_tolerance: RTTolerance::absolute(0.05),
        ..Default::default()
    }
}

#[test_log::test]
fn test_two_list_alignment() {
    let lists = vec![
        make_list(make_raw(0), "base", &[(4, 100.0, 5.0), (9, 200.0, 10.0)]),
        make_list(make_raw(1), "second", &[(1, 100.001, 5.02)]),
    ];
    let aligner = JoinAligner::new(&lists, params()).unwrap();
    let progress = Arc::new(ProgressCounter::new());
    let aligned = aligner.run(&progress, &CancellationToken::new()).unwrap();

    assert_eq!(progress.status(), TaskStatus::Finished);
    assert_eq!(progress.total(), 2);
    assert_eq!(progress.processed(), 2);

    assert_eq!(aligned.name(), "aligned");
    assert_eq!(aligned.num_rows(), 2);
    assert_eq!(aligned.raw_files().len(), 2);
    let ids: Vec<RowId> = aligned.rows().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![RowId(1), RowId(2)]);

    let first = &aligned.rows()[0];
    assert_eq!(first.num_features(), 2);
    assert!(first.has_feature_for(RawFileId(0)));
    assert!(first.has_feature_for(RawFileId(1)));
    assert_eq!(aligned.rows()[1].num_features(), 1);

    let method = aligned.applied_methods().last().unwrap();
    assert_eq!(method.description, "Join aligner");
    assert_eq!(method.parameters["list_name"], "aligned");
    let recorded: JoinAlignerParams = serde_json::from_value(method.parameters.clone()).unwrap();
    assert_eq!(recorded, params());

    // the inputs are untouched
    assert_eq!(lists[0].rows()[0].id(), RowId(4));
    assert_eq!(lists[0].rows()[0].num_features(), 1);
}

#[test_log::test]
fn test_unmatched_rows_are_appended() {
    let lists = vec![
        make_list(make_raw(0), "base", &[(1, 100.0, 5.0), (2, 200.0, 10.0)]),
        make_list(make_raw(1), "second", &[(1, 150.0, 7.0)]),
        make_list(make_raw(2), "third", &[(1, 200.002, 10.01), (2, 300.0, 2.0)]),
    ];
    let aligned = JoinAligner::new(&lists, params())
        .unwrap()
        .run(&mzfeatures_align::NoProgress, &CancellationToken::new())
        .unwrap();
    let ids: Vec<u32> = aligned.rows().iter().map(|r| r.id().0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(aligned.rows()[1].num_features(), 2);
    assert!((aligned.rows()[2].average_mz().unwrap() - 150.0).abs() < 1e-9);
    assert!((aligned.rows()[3].average_mz().unwrap() - 300.0).abs() < 1e-9);
}

#[test_log::test]
fn test_zero_weights_fail_before_processing() {
    let lists = vec![
        make_list(make_raw(0), "base", &[(1, 100.0, 5.0)]),
        make_list(make_raw(1), "second", &[(1, 100.0, 5.0)]),
    ];
    let params = JoinAlignerParams {
        mz_weight: 0.0,
        rt_weight: 0.0,
        ..params()
    };
    let progress = ProgressCounter::new();
    let err = JoinAligner::new(&lists, params)
        .unwrap()
        .run(&progress, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err, AlignmentError::ZeroWeights);
    assert_eq!(progress.status(), TaskStatus::Error);
    assert_eq!(progress.processed(), 0);
    assert_eq!(
        progress.error_message().as_deref(),
        Some("Cannot run alignment, all the weight parameters are zero")
    );
}

#[test_log::test]
fn test_shared_raw_file_fails() {
    let raw = make_raw(0);
    let lists = vec![
        make_list(raw.clone(), "base", &[(1, 100.0, 5.0), (2, 120.0, 5.0)]),
        make_list(raw, "again", &[(1, 100.0, 5.0)]),
    ];
    let progress = ProgressCounter::new();
    let err = JoinAligner::new(&lists, params())
        .unwrap()
        .run(&progress, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AlignmentError::DuplicateRawFile { ref file } if file == "sample-0.mzML"));
    assert_eq!(progress.status(), TaskStatus::Error);
    assert_eq!(progress.processed(), 0);
}

#[test_log::test]
fn test_canceled_alignment() {
    let lists = vec![
        make_list(make_raw(0), "base", &[(1, 100.0, 5.0)]),
        make_list(make_raw(1), "second", &[(1, 100.0, 5.0)]),
    ];
    let cancel = CancellationToken::new();
    cancel.cancel();
    let progress = ProgressCounter::new();
    let err = JoinAligner::new(&lists, params())
        .unwrap()
        .run(&progress, &cancel)
        .unwrap_err();
    assert_eq!(err, AlignmentError::Canceled);
    assert_eq!(progress.status(), TaskStatus::Canceled);
    assert!(progress.error_message().is_none());
}
