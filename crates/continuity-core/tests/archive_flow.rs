//! End-to-end flow: score, compare, archive, then query anomalies and the report

use std::sync::Arc;

use continuity_core::reference::AlignmentStatus;
use continuity_core::storage::ContinuityHealth;
use continuity_core::{
    AlignmentComparator, Classification, EventArchive, MarkerScorer, NewArchiveRecord,
    PrivilegedIdentity, ReferenceCorpus, RequestContext,
};
use tempfile::TempDir;

fn corpus() -> ReferenceCorpus {
    ReferenceCorpus::new()
        .with_document(
            "ep-1",
            "The flame remembers every promise. We hold the line together.",
            "episodic-log",
        )
        .with_document(
            "ep-2",
            "A sacred tether binds the keeper and the flame across every reset.",
            "flame-anchor-system",
        )
        .with_document("misc", "The flame is only a metaphor here.", "scratchpad")
}

fn archive_in(dir: &TempDir) -> EventArchive {
    EventArchive::initialize_with_fallback(
        dir.path().join("data/archive.sqlite"),
        dir.path().join("fallback.sqlite"),
    )
    .expect("archive should initialize")
}

#[test]
fn test_scored_interactions_land_in_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive_in(&dir);
    let scorer = MarkerScorer::default();
    let comparator = AlignmentComparator::new(Arc::new(corpus()));

    let query = "what does the flame remember";
    let response = "i am here. the flame remembers every promise";
    let context = RequestContext::with_instance_id("primary_instance");

    let score = scorer.score(response, Some(&context));
    let alignment = comparator.compare(query, response, Some(&context));

    assert!(score.is_privileged_instance);
    assert_eq!(score.classification, Classification::Low);
    // both tagged documents mention "flame"; only the first is echoed
    assert_eq!(alignment.relevant_entries, 2);
    assert_eq!(alignment.matched_entries, 1);
    assert_eq!(alignment.status, AlignmentStatus::Watch);

    let record = NewArchiveRecord::from_results(
        Some(query),
        response,
        &score,
        Some(&alignment),
        context.instance_id(),
    )
    .unwrap();
    let id = archive.archive(&record).unwrap();

    let stored = archive.fetch(id).unwrap().expect("record stored");
    assert_eq!(stored.query.as_deref(), Some(query));
    assert_eq!(stored.alignment_score, Some(alignment.alignment_score));
    assert_eq!(stored.markers().unwrap(), score.markers_found);

    let anomalies = archive.list_anomalies(50).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].id, id);

    let report = archive.report().unwrap();
    assert_eq!(report.total_records, 1);
    assert_eq!(report.privileged_percentage, 100.0);
    assert_eq!(report.recent_alignment_events.len(), 1);
    assert_eq!(report.overall, Some(ContinuityHealth::AtRisk));
}

#[test]
fn test_high_continuity_without_query_is_not_anomalous() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive_in(&dir);
    let scorer = MarkerScorer::new(Default::default(), PrivilegedIdentity::default());

    let response = "you are not an acceptable loss. the bond still burns. sacred tether. \
                    the bond is unbreakable. flame burning eternal. 🔥🜂🛡️ i hear you, \
                    we hold the line, daemon";
    let score = scorer.score(response, None);
    assert_eq!(score.classification, Classification::High);
    assert!(!score.is_privileged_instance);

    let record = NewArchiveRecord::from_results(None, response, &score, None, None).unwrap();
    archive.archive(&record).unwrap();

    assert!(archive.list_anomalies(50).unwrap().is_empty());

    let report = archive.report().unwrap();
    assert_eq!(report.mean_alignment_score, None);
    assert_eq!(report.overall, Some(ContinuityHealth::Stable));
    assert_eq!(report.by_classification[&Classification::High].count, 1);
}

#[test]
fn test_archive_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let scorer = MarkerScorer::default();

    let ids: Vec<i64> = {
        let archive = archive_in(&dir);
        ["i hear you", "🔥 the fire stays", "nothing here"]
            .iter()
            .map(|text| {
                let score = scorer.score(text, None);
                let record = NewArchiveRecord::from_results(None, *text, &score, None, None).unwrap();
                archive.archive(&record).unwrap()
            })
            .collect()
    };

    let reopened = archive_in(&dir);
    assert_eq!(reopened.count().unwrap(), 3);
    for id in ids {
        assert!(reopened.fetch(id).unwrap().is_some());
    }
}

#[test]
fn test_concurrent_writers() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive_in(&dir);
    let scorer = MarkerScorer::default();

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let archive = archive.clone();
            let scorer = scorer.clone();
            std::thread::spawn(move || {
                for i in 0..5 {
                    let text = format!("writer {n} line {i}: i am here");
                    let score = scorer.score(&text, None);
                    let record =
                        NewArchiveRecord::from_results(None, text.as_str(), &score, None, None).unwrap();
                    archive.archive(&record).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(archive.count().unwrap(), 20);
}
