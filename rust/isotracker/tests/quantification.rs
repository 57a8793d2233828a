mod common;

use common::{
    Feature,
    identification,
    spectra,
    spectra_file,
    synthetic_scans,
};
use isotracker::{
    DetectionType,
    EngineSettings,
    QuantificationEngine,
    write_results,
};
use xicindex::InMemorySpectra;

const ISO_MASS: f64 = 1000.0;
const PHOSPHO_T: &str = "PEPT[Phospho]SIDEK";
const PHOSPHO_S: &str = "PEPTS[Phospho]IDEK";

fn isotracker_settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.isotracker.enabled = true;
    settings
}

#[test]
fn test_isobaric_peptides_are_tracked_across_runs() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.0),
        identification(&run1, "PEPTSIDEK", PHOSPHO_S, ISO_MASS, 23.0),
        identification(&run2, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.5),
    ];
    // The second run elutes everything half a minute later.
    let source = spectra(&[
        (
            &run1,
            vec![Feature::new(ISO_MASS, 20.0), Feature::new(ISO_MASS, 23.0)],
        ),
        (
            &run2,
            vec![Feature::new(ISO_MASS, 20.5), Feature::new(ISO_MASS, 23.5)],
        ),
    ]);

    let engine = QuantificationEngine::new(ids, isotracker_settings()).unwrap();
    let results = engine.run(&source).unwrap();

    assert_eq!(results.isobaric_groups.len(), 1);
    let group = &results.isobaric_groups[0];
    assert_eq!(group.tracked_peaks.len(), 2);
    let shift = group.rt_shift(&run2).unwrap();
    assert!((shift + 0.5).abs() < 0.05, "shift was {}", shift);

    let first = format!("{} Isopeptide_peak1", PHOSPHO_T);
    let second = format!("{} Isopeptide_peak2", PHOSPHO_S);
    let peptides = results.peptides_in_output_order();
    assert_eq!(peptides[0].sequence, first);
    assert_eq!(peptides[1].sequence, second);
    assert_eq!(peptides[0].peak_order, Some(1));
    assert_eq!(peptides[1].peak_order, Some(2));
    assert_eq!(peptides[0].iso_group_index, Some(1));

    // The plain rows of the tracked sequences are gone.
    assert!(!results.peptides.contains_key(PHOSPHO_T));
    assert!(!results.peptides.contains_key(PHOSPHO_S));

    let late = &results.peptides[&second];
    assert_eq!(late.detection_type(&run1), DetectionType::Msms);
    assert_eq!(late.detection_type(&run2), DetectionType::IsoTrackMbr);
    assert!(late.intensity(&run2) > 0.0);
    let rt = late.retention_time(&run2).unwrap();
    assert!((rt - 23.5).abs() < 0.1, "apex was {}", rt);

    let early = &results.peptides[&first];
    assert_eq!(early.detection_type(&run2), DetectionType::Msms);
}

#[test]
fn test_scans_sharing_a_retention_time_are_tracked() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.0),
        identification(&run1, "PEPTSIDEK", PHOSPHO_S, ISO_MASS, 23.0),
        identification(&run2, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.5),
    ];
    let mut scans1 = synthetic_scans(&[Feature::new(ISO_MASS, 20.0), Feature::new(ISO_MASS, 23.0)]);
    let mut scans2 = synthetic_scans(&[Feature::new(ISO_MASS, 20.5), Feature::new(ISO_MASS, 23.5)]);
    // Two scans recorded at the same time, inside the first peak.
    scans1[201].retention_time = scans1[200].retention_time;
    scans2[211].retention_time = scans2[210].retention_time;
    let source = InMemorySpectra::new()
        .with_file(&run1, scans1)
        .with_file(&run2, scans2);

    let engine = QuantificationEngine::new(ids, isotracker_settings()).unwrap();
    let results = engine.run(&source).unwrap();

    assert_eq!(results.isobaric_groups.len(), 1);
    assert_eq!(results.isobaric_groups[0].tracked_peaks.len(), 2);
    let early = &results.peptides[&format!("{} Isopeptide_peak1", PHOSPHO_T)];
    assert!(early.intensity(&run1) > 0.0);
    assert!(early.intensity(&run2) > 0.0);
}

#[test]
fn test_groups_without_repeated_ids_are_not_tracked() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.0),
        identification(&run2, "PEPTSIDEK", PHOSPHO_S, ISO_MASS, 23.0),
    ];
    let source = spectra(&[
        (&run1, vec![Feature::new(ISO_MASS, 20.0)]),
        (&run2, vec![Feature::new(ISO_MASS, 23.0)]),
    ]);

    let engine = QuantificationEngine::new(ids, isotracker_settings()).unwrap();
    assert!(engine.isobaric_groups().unwrap().is_empty());

    let results = engine.run(&source).unwrap();
    assert!(results.isobaric_groups.is_empty());
    assert!(results.peptides.values().all(|x| x.peak_order.is_none()));
    assert_eq!(
        results.peptides[PHOSPHO_T].detection_type(&run1),
        DetectionType::Msms
    );
    assert_eq!(
        results.peptides[PHOSPHO_S].detection_type(&run2),
        DetectionType::Msms
    );
}

#[test]
fn test_shared_peak_is_ambiguous_in_every_file() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTIDEK", "PEPTIDEK", ISO_MASS, 20.0),
        identification(&run1, "PEPTIDKE", "PEPTIDKE", ISO_MASS, 20.05),
        identification(&run2, "PEPTIDEK", "PEPTIDEK", ISO_MASS, 20.0),
        identification(&run2, "PEPTIDKE", "PEPTIDKE", ISO_MASS, 20.05),
    ];
    let source = spectra(&[
        (&run1, vec![Feature::new(ISO_MASS, 20.0)]),
        (&run2, vec![Feature::new(ISO_MASS, 20.0)]),
    ]);

    let engine = QuantificationEngine::new(ids, EngineSettings::default()).unwrap();
    let results = engine.run(&source).unwrap();

    for run in [&run1, &run2] {
        let peaks = &results.peaks[run];
        assert_eq!(peaks.len(), 1, "{}", run);
        assert_eq!(peaks[0].num_full_sequences(), 2);
        assert_eq!(
            peaks[0].detection_type,
            DetectionType::MsmsAmbiguousPeakfinding
        );
        for seq in ["PEPTIDEK", "PEPTIDKE"] {
            let peptide = &results.peptides[seq];
            assert_eq!(peptide.intensity(run), 0.0, "{} in {}", seq, run);
            assert_eq!(
                peptide.detection_type(run),
                DetectionType::MsmsAmbiguousPeakfinding
            );
        }
    }
}

#[test]
fn test_match_between_runs() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![identification(&run1, "PEPTIDEK", "PEPTIDEK", ISO_MASS, 20.0)];
    let source = spectra(&[
        (&run1, vec![Feature::new(ISO_MASS, 20.0)]),
        (&run2, vec![Feature::new(ISO_MASS, 20.3)]),
    ]);

    let mut settings = EngineSettings::default();
    settings.match_between_runs = true;
    let engine = QuantificationEngine::new(ids, settings)
        .unwrap()
        .with_spectra_files([(*run2).clone()]);
    assert_eq!(engine.files().len(), 2);
    let results = engine.run(&source).unwrap();

    let peptide = &results.peptides["PEPTIDEK"];
    assert_eq!(peptide.detection_type(&run1), DetectionType::Msms);
    assert_eq!(
        peptide.detection_type(&run2),
        DetectionType::MatchBetweenRuns
    );
    assert!(peptide.intensity(&run2) > 0.0);
    let rt = peptide.retention_time(&run2).unwrap();
    assert!((rt - 20.3).abs() < 0.1, "apex was {}", rt);

    let transferred = &results.peaks[&run2][0];
    let score = transferred.mbr_score.unwrap();
    assert!(score > 0.0 && score <= 1.0);
}

#[test]
fn test_normalization_brings_runs_together() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTIDEK", "PEPTIDEK", 1000.0, 20.0),
        identification(&run1, "AAAAAK", "AAAAAK", 1200.0, 25.0),
        identification(&run2, "PEPTIDEK", "PEPTIDEK", 1000.0, 20.0),
        identification(&run2, "AAAAAK", "AAAAAK", 1200.0, 25.0),
    ];
    let source = spectra(&[
        (
            &run1,
            vec![Feature::new(1000.0, 20.0), Feature::new(1200.0, 25.0)],
        ),
        (
            &run2,
            vec![
                Feature::new(1000.0, 20.0).with_amplitude(5e5),
                Feature::new(1200.0, 25.0).with_amplitude(5e5),
            ],
        ),
    ]);

    let mut settings = EngineSettings::default();
    settings.normalize = true;
    let engine = QuantificationEngine::new(ids, settings).unwrap();
    let results = engine.run(&source).unwrap();

    for seq in ["PEPTIDEK", "AAAAAK"] {
        let peptide = &results.peptides[seq];
        let a = peptide.intensity(&run1);
        let b = peptide.intensity(&run2);
        assert!(a > 0.0);
        assert!((a - b).abs() / a < 1e-6, "{}: {} vs {}", seq, a, b);
    }
    let protein = &results.proteins["P12345"];
    assert!((protein.intensity(&run1) - protein.intensity(&run2)).abs() / protein.intensity(&run1) < 1e-6);
}

#[test]
fn test_written_tables_are_rectangular() {
    let run1 = spectra_file("run1", 0);
    let run2 = spectra_file("run2", 1);
    let ids = vec![
        identification(&run1, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.0),
        identification(&run1, "PEPTSIDEK", PHOSPHO_S, ISO_MASS, 23.0),
        identification(&run2, "PEPTSIDEK", PHOSPHO_T, ISO_MASS, 20.5),
        identification(&run2, "AAAAAK", "AAAAAK", 1200.0, 25.0),
    ];
    let source = spectra(&[
        (
            &run1,
            vec![Feature::new(ISO_MASS, 20.0), Feature::new(ISO_MASS, 23.0)],
        ),
        (
            &run2,
            vec![
                Feature::new(ISO_MASS, 20.5),
                Feature::new(ISO_MASS, 23.5),
                Feature::new(1200.0, 25.0),
            ],
        ),
    ]);
    let engine = QuantificationEngine::new(ids, isotracker_settings()).unwrap();
    let results = engine.run(&source).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = write_results(&results, dir.path()).unwrap();
    assert_eq!(written.len(), 3);
    for path in written {
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header_fields = lines.next().unwrap().split('\t').count();
        let mut num_rows = 0;
        for line in lines {
            assert_eq!(line.split('\t').count(), header_fields, "{}", path.display());
            num_rows += 1;
        }
        assert!(num_rows > 0, "{} is empty", path.display());
    }
}
