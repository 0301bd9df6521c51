//! Integration tests for hierarchy-curator
//!
//! Runs full curations against in-memory and SQLite stores.

use hierarchy_curator::config::{CurateConfig, ReportConfig};
use hierarchy_curator::curator::builtin::ContainerPath;
use hierarchy_curator::curator::{Context, Curator};
use hierarchy_curator::distributor::{partition, Distributor, RunStatus, WorkerStatus};
use hierarchy_curator::error::{CurationError, CuratorError, ReportError};
use hierarchy_curator::hierarchy::sqlite::FixtureNode;
use hierarchy_curator::hierarchy::{
    Connect, Container, HierarchyStore, Level, MemoryStore, MemoryTree, NodeId, SqliteConnector,
    SqliteStore, WorkRef,
};
use hierarchy_curator::report::{Record, Reporter};
use hierarchy_curator::walker::TraversalOrder;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

/// ```text
/// p  (root "proj")
/// ├── pf  leaf      "protocol.pdf"
/// ├── g1  group     "sub-01"
/// │   ├── s1 subgroup "ses-01"
/// │   │   └── f1 leaf "scan.dcm"
/// │   └── s2 subgroup "ses-02"
/// ├── g2  group     "sub-02"
/// │   └── s3 subgroup "ses-01"
/// └── g3  group     "scratch"
///     └── s4 subgroup "tmp"
/// ```
fn sample_tree() -> MemoryStore {
    let mut tree = MemoryTree::new("p", "proj");
    let root = tree.root_id().clone();
    tree.add(&root, "pf", Level::Leaf, "protocol.pdf").unwrap();
    let g1 = tree.add(&root, "g1", Level::Group, "sub-01").unwrap();
    let s1 = tree.add(&g1, "s1", Level::SubGroup, "ses-01").unwrap();
    tree.add(&s1, "f1", Level::Leaf, "scan.dcm").unwrap();
    tree.add(&g1, "s2", Level::SubGroup, "ses-02").unwrap();
    let g2 = tree.add(&root, "g2", Level::Group, "sub-02").unwrap();
    tree.add(&g2, "s3", Level::SubGroup, "ses-01").unwrap();
    let g3 = tree.add(&root, "g3", Level::Group, "scratch").unwrap();
    tree.add(&g3, "s4", Level::SubGroup, "tmp").unwrap();
    tree.into_store()
}

const ALL_IDS: [&str; 10] = ["p", "pf", "g1", "s1", "f1", "s2", "g2", "s3", "g3", "s4"];

type Visits = Arc<Mutex<Vec<(Option<usize>, String)>>>;

/// Records which worker curated which node
#[derive(Clone, Default)]
struct Recorder {
    visits: Visits,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
    decline: Option<&'static str>,
}

impl Recorder {
    fn ids(&self) -> Vec<String> {
        self.visits.lock().iter().map(|(_, id)| id.clone()).collect()
    }

    fn by_worker(&self) -> HashMap<Option<usize>, BTreeSet<String>> {
        let mut map: HashMap<_, BTreeSet<_>> = HashMap::new();
        for (worker, id) in self.visits.lock().iter() {
            map.entry(*worker).or_default().insert(id.clone());
        }
        map
    }

    /// Nodes curated by one worker, in curation order
    fn sequence(&self, worker: usize) -> Vec<String> {
        self.visits
            .lock()
            .iter()
            .filter(|(w, _)| *w == Some(worker))
            .map(|(_, id)| id.clone())
            .collect()
    }
}

impl Curator for Recorder {
    type Snapshot = ();

    fn validate(&self, node: &Container, _ctx: &Context<'_, ()>) -> bool {
        self.decline != Some(node.label())
    }

    fn curate(&mut self, node: &Container, ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
        if self.panic_on == Some(node.label()) {
            panic!("curator blew up on {}", node.label());
        }
        self.visits.lock().push((ctx.worker(), node.id().to_string()));
        if self.fail_on == Some(node.label()) {
            return Err(CurationError::msg("label rejected"));
        }
        ctx.report(Record::new().field("id", node.id().as_str()))?;
        Ok(())
    }
}

fn run_recorder(recorder: Recorder, config: CurateConfig) -> hierarchy_curator::RunResult {
    let mut distributor = Distributor::new(sample_tree(), config);
    distributor.run(WorkRef::root("p"), recorder).unwrap()
}

fn sorted(ids: &[&str]) -> Vec<String> {
    let mut ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    ids.sort();
    ids
}

#[test]
fn test_single_worker_depth_first_order() {
    let recorder = Recorder::default();
    let result = run_recorder(recorder.clone(), CurateConfig::default());

    assert_eq!(
        recorder.ids(),
        vec!["p", "g3", "s4", "g2", "s3", "g1", "s2", "s1", "f1", "pf"]
    );
    assert_eq!(result.visited, 10);
    assert_eq!(result.curated, 10);
    assert_eq!(result.workers, 0);
    assert_eq!(result.status(), RunStatus::Clean);
}

#[test]
fn test_single_worker_breadth_first_order() {
    let recorder = Recorder::default();
    run_recorder(
        recorder.clone(),
        CurateConfig::default().with_order(TraversalOrder::BreadthFirst),
    );

    assert_eq!(
        recorder.ids(),
        vec!["p", "pf", "g1", "g2", "g3", "s1", "s2", "s3", "s4", "f1"]
    );
}

#[test]
fn test_every_node_curated_exactly_once() {
    for workers in 1..=4 {
        for order in [TraversalOrder::DepthFirst, TraversalOrder::BreadthFirst] {
            let recorder = Recorder::default();
            let config = CurateConfig::default().with_workers(workers).with_order(order);
            let result = run_recorder(recorder.clone(), config);

            let mut ids = recorder.ids();
            ids.sort();
            assert_eq!(ids, sorted(&ALL_IDS), "workers={} order={:?}", workers, order);
            assert_eq!(result.visited, 10);
            assert_eq!(result.status(), RunStatus::Clean);
        }
    }
}

#[test]
fn test_root_curated_in_caller_and_children_round_robin() {
    let recorder = Recorder::default();
    let result = run_recorder(recorder.clone(), CurateConfig::default().with_workers(2));

    // Root children in enumeration order: pf, g1, g2, g3
    let by_worker = recorder.by_worker();
    assert_eq!(by_worker[&None], BTreeSet::from(["p".to_string()]));
    assert_eq!(
        by_worker[&Some(0)],
        ["pf", "g2", "s3"].iter().map(|s| s.to_string()).collect()
    );
    assert_eq!(
        by_worker[&Some(1)],
        ["g1", "s1", "f1", "s2", "g3", "s4"].iter().map(|s| s.to_string()).collect()
    );

    assert_eq!(result.workers, 2);
    assert_eq!(result.exits[0].assigned, 2);
    assert_eq!(result.exits[1].assigned, 2);
}

#[test]
fn test_more_workers_than_children() {
    let recorder = Recorder::default();
    let result = run_recorder(recorder.clone(), CurateConfig::default().with_workers(6));

    assert_eq!(result.workers, 6);
    assert_eq!(result.exits[5].assigned, 0);
    assert_eq!(result.exits[5].status, WorkerStatus::Completed);
    assert_eq!(recorder.ids().len(), 10);
}

#[test]
fn test_stop_level_limits_expansion() {
    let recorder = Recorder::default();
    let config = CurateConfig::default().with_stop_level(Some(Level::SubGroup));
    run_recorder(recorder.clone(), config);

    // Subgroups are curated but never expanded; levels past the stop are never enumerated
    let mut ids = recorder.ids();
    ids.sort();
    assert_eq!(ids, sorted(&["p", "g1", "g2", "g3", "s1", "s2", "s3", "s4"]));
}

#[test]
fn test_worker_walks_breadth_first_across_its_assignment() {
    let recorder = Recorder::default();
    run_recorder(
        recorder.clone(),
        CurateConfig::default()
            .with_workers(2)
            .with_order(TraversalOrder::BreadthFirst),
    );

    // Each worker's frontier starts as its whole assignment
    assert_eq!(recorder.sequence(0), vec!["pf", "g2", "s3"]);
    assert_eq!(recorder.sequence(1), vec!["g1", "g3", "s1", "s2", "s4", "f1"]);
}

#[test]
fn test_worker_walks_depth_first_one_subtree_at_a_time() {
    let recorder = Recorder::default();
    run_recorder(recorder.clone(), CurateConfig::default().with_workers(2));

    assert_eq!(recorder.sequence(0), vec!["pf", "g2", "s3"]);
    // g1's subtree is finished before g3 starts
    assert_eq!(recorder.sequence(1), vec!["g1", "s2", "s1", "f1", "g3", "s4"]);
}

#[test]
fn test_stop_level_applies_inside_workers() {
    let recorder = Recorder::default();
    let config = CurateConfig::default()
        .with_workers(3)
        .with_stop_level(Some(Level::SubGroup));
    let result = run_recorder(recorder.clone(), config);

    // The root leaf is past the stop, so only groups are partitioned
    assert_eq!(recorder.sequence(0), vec!["g1", "s2", "s1"]);
    assert_eq!(recorder.sequence(1), vec!["g2", "s3"]);
    assert_eq!(recorder.sequence(2), vec!["g3", "s4"]);
    assert_eq!(result.visited, 8);
}

#[test]
fn test_declined_node_is_not_curated_or_expanded() {
    let recorder = Recorder {
        decline: Some("sub-02"),
        ..Recorder::default()
    };
    let result = run_recorder(recorder.clone(), CurateConfig::default().with_workers(2));

    let ids = recorder.ids();
    assert!(!ids.contains(&"g2".to_string()));
    assert!(!ids.contains(&"s3".to_string()));
    assert_eq!(result.skipped, 1);
    assert_eq!(result.visited, 9);
}

#[test]
fn test_admission_override_prunes_but_still_curates() {
    let recorder = Recorder::default();
    let config = CurateConfig::default()
        .with_workers(3)
        .with_admission(|node: &Container| node.label() != "scratch");
    run_recorder(recorder.clone(), config);

    let ids = recorder.ids();
    assert!(ids.contains(&"g3".to_string()));
    assert!(!ids.contains(&"s4".to_string()));
    assert_eq!(ids.len(), 9);
}

#[test]
fn test_curation_error_is_isolated() {
    for workers in [1, 3] {
        let recorder = Recorder {
            fail_on: Some("ses-01"),
            ..Recorder::default()
        };
        let result = run_recorder(recorder.clone(), CurateConfig::default().with_workers(workers));

        // Two nodes are labelled ses-01; their subtrees are still walked
        assert_eq!(result.failed, 2);
        assert_eq!(result.curated, 8);
        assert!(recorder.ids().contains(&"f1".to_string()));
        assert_eq!(result.status(), RunStatus::Clean);
    }
}

#[test]
fn test_worker_panic_does_not_stop_other_workers() {
    let recorder = Recorder {
        panic_on: Some("sub-01"),
        ..Recorder::default()
    };
    let result = run_recorder(recorder.clone(), CurateConfig::default().with_workers(2));

    assert_eq!(result.status(), RunStatus::WorkersFailed(1));
    assert_eq!(result.exits[0].status, WorkerStatus::Completed);
    match &result.exits[1].status {
        WorkerStatus::Failed(reason) => assert!(reason.contains("curator blew up on sub-01")),
        other => panic!("unexpected status {:?}", other),
    }

    let by_worker = recorder.by_worker();
    assert_eq!(by_worker[&Some(0)].len(), 3);
    assert!(!by_worker.contains_key(&Some(1)));
}

/// Reports a different field set for one label
#[derive(Clone, Default)]
struct Mismatch;

impl Curator for Mismatch {
    type Snapshot = ();

    fn curate(&mut self, node: &Container, ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
        let record = if node.label() == "sub-02" {
            Record::new().field("other", node.id().as_str())
        } else {
            Record::new().field("id", node.id().as_str())
        };
        ctx.report(record)?;
        Ok(())
    }
}

#[test]
fn test_schema_mismatch_aborts_only_that_worker() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.jsonl");
    let config = CurateConfig::default()
        .with_workers(2)
        .with_report(ReportConfig::new(&path).without_outcomes());

    let mut distributor = Distributor::new(sample_tree(), config);
    let result = distributor.run(WorkRef::root("p"), Mismatch).unwrap();

    // Worker 0 wrote pf then aborted on g2; worker 1 wrote its six nodes
    assert_eq!(result.status(), RunStatus::WorkersFailed(1));
    assert_eq!(result.records, 8);

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|row| row.get("id").is_some() && row.get("other").is_none()));
}

#[test]
fn test_schema_mismatch_fails_single_worker_run() {
    let dir = tempdir().unwrap();
    let config = CurateConfig::default()
        .with_report(ReportConfig::new(dir.path().join("report.jsonl")).without_outcomes());

    let mut distributor = Distributor::new(sample_tree(), config);
    let err = distributor.run(WorkRef::root("p"), Mismatch).unwrap_err();
    assert!(matches!(
        err,
        CuratorError::Curation(CurationError::Report(ReportError::SchemaMismatch { .. }))
    ));
}

/// Deletes a container from the shared store when it curates a given node
#[derive(Clone)]
struct Deleter {
    store: MemoryStore,
    trigger: &'static str,
    target: &'static str,
}

impl Curator for Deleter {
    type Snapshot = ();

    fn curate(&mut self, node: &Container, _ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
        if node.id().as_str() == self.trigger {
            self.store.remove(&NodeId::from(self.target));
        }
        Ok(())
    }
}

#[test]
fn test_reload_skips_deleted_nodes() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.jsonl");
    let store = sample_tree();
    let deleter = Deleter {
        store: store.clone(),
        trigger: "g3",
        target: "g1",
    };
    let config = CurateConfig::default()
        .with_reload(true)
        .with_report(ReportConfig::new(&report));

    // Depth-first pops g3 before g1, so g1 is gone by the time it is reloaded
    let mut distributor = Distributor::new(store, config);
    let result = distributor.run(WorkRef::root("p"), deleter).unwrap();
    assert_eq!(result.unresolved, 1);
    assert_eq!(result.visited, 6);
    assert_eq!(result.status(), RunStatus::Clean);

    let outcomes = std::fs::read_to_string(dir.path().join("report.outcomes.jsonl")).unwrap();
    let rows: Vec<serde_json::Value> = outcomes
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 7);
    let unresolved: Vec<_> = rows.iter().filter(|r| r["status"] == "unresolved").collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0]["id"], "g1");
}

#[test]
fn test_root_deleted_during_curation_is_unresolved() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.jsonl");
    let store = sample_tree();
    let deleter = Deleter {
        store: store.clone(),
        trigger: "p",
        target: "p",
    };
    let config = CurateConfig::default()
        .with_workers(2)
        .with_reload(true)
        .with_report(ReportConfig::new(&report));

    let mut distributor = Distributor::new(store, config);
    let result = distributor.run(WorkRef::root("p"), deleter).unwrap();
    assert_eq!(result.visited, 1);
    assert_eq!(result.unresolved, 1);
    assert!(result.exits.iter().all(|exit| exit.assigned == 0));

    let outcomes = std::fs::read_to_string(dir.path().join("report.outcomes.jsonl")).unwrap();
    let rows: Vec<serde_json::Value> = outcomes
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let unresolved: Vec<_> = rows.iter().filter(|r| r["status"] == "unresolved").collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0]["id"], "p");
}

#[test]
fn test_reload_fetches_every_node() {
    let store = sample_tree();
    let before = store.fetch_count();
    let config = CurateConfig::default().with_reload(true);

    let mut distributor = Distributor::new(store.clone(), config);
    distributor.run(WorkRef::root("p"), Recorder::default()).unwrap();

    // One fetch to resolve the root, then one re-fetch per yielded node
    assert_eq!(store.fetch_count() - before, 11);
}

#[test]
fn test_partition_is_round_robin() {
    let refs: Vec<WorkRef> = (0..7).map(|i| WorkRef::root(format!("r{}", i))).collect();
    let slots = partition(refs, 3);
    let ids: Vec<Vec<String>> = slots
        .iter()
        .map(|slot| slot.iter().map(|w| w.id.to_string()).collect())
        .collect();
    assert_eq!(
        ids,
        vec![vec!["r0", "r3", "r6"], vec!["r1", "r4"], vec!["r2", "r5"]]
    );
}

fn concurrent_appends(path: &std::path::Path, producers: usize, per_producer: usize) -> u64 {
    let reporter = Reporter::spawn_at(path, None, 64, 128).unwrap();
    let threads: Vec<_> = (0..producers)
        .map(|worker| {
            let handle = reporter.handle();
            thread::spawn(move || {
                for seq in 0..per_producer {
                    // Field order varies by producer; the schema fixes the column order
                    let record = if worker % 2 == 0 {
                        Record::new().field("worker", worker).field("seq", seq)
                    } else {
                        Record::new().field("seq", seq).field("worker", worker)
                    };
                    handle.append(record).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    reporter.finish().unwrap()
}

#[test]
fn test_reporter_integrity_json_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.jsonl");
    assert_eq!(concurrent_appends(&path, 4, 250), 1000);

    let content = std::fs::read_to_string(&path).unwrap();
    let mut seen = BTreeSet::new();
    let mut first_keys = None;
    for line in content.lines() {
        let row: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line).unwrap();
        let keys: Vec<String> = row.keys().cloned().collect();
        assert_eq!(first_keys.get_or_insert_with(|| keys.clone()), &keys);
        seen.insert((row["worker"].as_u64().unwrap(), row["seq"].as_u64().unwrap()));
    }
    assert_eq!(seen.len(), 1000);
}

#[test]
fn test_reporter_integrity_sqlite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.db");
    assert_eq!(concurrent_appends(&path, 3, 300), 900);

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(DISTINCT worker || '-' || seq) FROM records", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 900);

    let recorded: String = conn
        .query_row("SELECT value FROM report_info WHERE key = 'records'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(recorded, "900");
}

/// Marks every container it curates through the worker's own connection
#[derive(Clone, Default)]
struct Marker;

impl Curator for Marker {
    type Snapshot = ();

    fn curate(&mut self, node: &Container, ctx: &mut Context<'_, ()>) -> Result<(), CurationError> {
        let worker = ctx.worker().map_or(-1, |w| w as i64);
        ctx.store()
            .update_info(node.level(), node.id(), "curated_by", serde_json::json!(worker))?;
        Ok(())
    }
}

fn sqlite_store(path: &std::path::Path) {
    let fixture: FixtureNode = serde_json::from_value(serde_json::json!({
        "id": "p", "level": "root", "label": "proj",
        "children": [
            {"id": "pf", "level": "leaf", "label": "protocol.pdf"},
            {"id": "g1", "level": "group", "label": "sub-01", "children": [
                {"id": "s1", "level": "subgroup", "label": "ses-01", "children": [
                    {"id": "f1", "level": "leaf", "label": "scan.dcm"},
                    {"id": "lg1", "level": "leafgroup", "label": "anat", "children": [
                        {"id": "o1", "level": "output", "label": "t1.nii"}
                    ]}
                ]}
            ]},
            {"id": "g2", "level": "group", "label": "sub-02"},
            {"id": "g3", "level": "group", "label": "sub-03", "children": [
                {"id": "s3", "level": "subgroup", "label": "ses-01"}
            ]}
        ]
    }))
    .unwrap();
    SqliteStore::create(path).unwrap().import(&fixture).unwrap();
}

#[test]
fn test_sqlite_end_to_end_paths() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("store.db");
    let report_path = dir.path().join("paths.db");
    sqlite_store(&store_path);

    let config = CurateConfig::default()
        .with_workers(3)
        .with_report(ReportConfig::new(&report_path));
    let mut distributor = Distributor::new(SqliteConnector::new(&store_path), config);
    let result = distributor
        .run(WorkRef::root("p"), ContainerPath::default())
        .unwrap();

    assert_eq!(result.status(), RunStatus::Clean);
    assert_eq!(result.visited, 10);
    assert_eq!(result.records, 10);

    let conn = Connection::open(&report_path).unwrap();
    let paths: BTreeSet<String> = conn
        .prepare("SELECT path FROM records")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert!(paths.contains("proj"));
    assert!(paths.contains("proj/protocol.pdf"));
    assert!(paths.contains("proj/sub-01/ses-01/anat/t1.nii"));
    assert!(paths.contains("proj/sub-03/ses-01"));

    let outcomes = Connection::open(dir.path().join("paths.outcomes.db")).unwrap();
    let curated: i64 = outcomes
        .query_row("SELECT COUNT(*) FROM records WHERE status = 'curated'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(curated, 10);
}

#[test]
fn test_sqlite_workers_write_through_own_connections() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("store.db");
    sqlite_store(&store_path);

    let config = CurateConfig::default().with_workers(4);
    let mut distributor = Distributor::new(SqliteConnector::new(&store_path), config);
    let result = distributor.run(WorkRef::root("p"), Marker).unwrap();
    assert_eq!(result.curated, 10);

    let store = SqliteConnector::new(&store_path).connect().unwrap();
    let root = store.fetch(Level::Root, &"p".into()).unwrap();
    assert_eq!(root.info().get("curated_by"), Some(&serde_json::json!(-1)));
    let output = store.fetch(Level::Output, &"o1".into()).unwrap();
    let worker = output.info()["curated_by"].as_i64().unwrap();
    assert!((0..4).contains(&worker));
}

#[test]
fn test_missing_root_fails_run() {
    let mut distributor = Distributor::new(sample_tree(), CurateConfig::default().with_workers(2));
    let err = distributor
        .run(WorkRef::root("nope"), Recorder::default())
        .unwrap_err();
    assert!(matches!(err, CuratorError::Store(_)));
}

#[test]
fn test_missing_root_leaves_existing_report_untouched() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.jsonl");
    let outcomes = dir.path().join("report.outcomes.jsonl");
    std::fs::write(&report, "{\"id\":\"old\"}\n").unwrap();
    std::fs::write(&outcomes, "{\"status\":\"curated\"}\n").unwrap();

    let config = CurateConfig::default()
        .with_workers(2)
        .with_report(ReportConfig::new(&report));
    let mut distributor = Distributor::new(sample_tree(), config);
    assert!(distributor
        .run(WorkRef::root("nope"), Recorder::default())
        .is_err());

    assert_eq!(std::fs::read_to_string(&report).unwrap(), "{\"id\":\"old\"}\n");
    assert_eq!(
        std::fs::read_to_string(&outcomes).unwrap(),
        "{\"status\":\"curated\"}\n"
    );
}

#[test]
fn test_invalid_worker_count_rejected() {
    let mut distributor = Distributor::new(sample_tree(), CurateConfig::default().with_workers(0));
    assert!(matches!(
        distributor.run(WorkRef::root("p"), Recorder::default()),
        Err(CuratorError::Config(_))
    ));
}
