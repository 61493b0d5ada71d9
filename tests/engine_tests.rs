//! Engine integration tests
//!
//! Drive the public API the way a reconciliation controller would:
//! provision, persist the descriptor, read it back, release it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use hostpath_provisioner::engine::allocator::candidate_names;
use hostpath_provisioner::{
    AccessMode, DeleteFailure, DeleteOutcome, EngineSettings, InMemoryPolicySource,
    OWNER_ANNOTATION, ProvisionError, ProvisionRequest, ProvisioningEngine, ReclaimPolicy,
    VolumeDescriptor, VolumePhase, VolumeRecord,
};
use tempfile::TempDir;

const CLASS: &str = "shared-nfs";

fn class_params(root: &TempDir) -> HashMap<String, String> {
    HashMap::from([("pvDir".to_string(), root.path().display().to_string())])
}

fn engine_for(root: &TempDir, identity: &str) -> ProvisioningEngine {
    let policies = InMemoryPolicySource::new().with_class(CLASS, class_params(root));
    ProvisioningEngine::new(EngineSettings::new(identity), Arc::new(policies))
        .expect("valid settings") // test: known-good input
}

fn request(root: &TempDir, volume: &str) -> ProvisionRequest {
    let mut request = ProvisionRequest::new(volume, 5 * 1024 * 1024)
        .namespace("ns")
        .storage_class(CLASS)
        .access_mode(AccessMode::ReadWriteOnce);
    request.parameters = class_params(root);
    request
}

#[test]
fn test_round_trip_removes_only_the_volume() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");

    let first = engine.provision(&request(&root, "pvc-1")).unwrap();
    let second = engine.provision(&request(&root, "pvc-2")).unwrap();
    fs::write(first.path().join("data.bin"), b"payload").unwrap();
    fs::write(second.path().join("data.bin"), b"payload").unwrap();

    // controller persists the descriptor and hands back a record later
    let json = serde_json::to_string(&first.descriptor).unwrap();
    let stored: VolumeDescriptor = serde_json::from_str(&json).unwrap();
    let record = VolumeRecord::from_descriptor(&stored);
    assert_eq!(record, first.record);

    let outcome = engine.delete(&record);
    assert!(outcome.is_deleted());
    assert!(!first.path().exists());
    assert!(second.path().join("data.bin").is_file());
}

#[test]
fn test_same_claim_name_gets_suffixed_directories() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");
    let ns = root.path().join("ns");

    let paths: Vec<PathBuf> = (0..3)
        .map(|i| {
            let req = request(&root, &format!("pvc-{i}")).claim("data");
            engine.provision(&req).unwrap().path().to_path_buf()
        })
        .collect();

    assert_eq!(paths, vec![ns.join("data"), ns.join("data-01"), ns.join("data-02")]);
}

#[test]
fn test_orphaned_directory_is_never_reused() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");
    let orphan = root.path().join("ns").join("pvc-1");
    fs::create_dir_all(&orphan).unwrap();
    fs::write(orphan.join("keep"), b"old data").unwrap();

    let volume = engine.provision(&request(&root, "pvc-1")).unwrap();
    assert_eq!(volume.path(), root.path().join("ns").join("pvc-1-01"));
    assert!(orphan.join("keep").is_file());
}

#[test]
fn test_exhausted_names_fail_provision() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");
    let ns = root.path().join("ns");
    for name in candidate_names("vol") {
        fs::create_dir_all(ns.join(name)).unwrap();
    }

    let err = engine.provision(&request(&root, "vol")).unwrap_err();
    assert!(matches!(err, ProvisionError::NamesExhausted { .. }));
}

#[test]
fn test_missing_pv_dir_fails_provision() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");

    let mut req = request(&root, "pvc-1");
    req.parameters.clear();
    let err = engine.provision(&req).unwrap_err();
    assert!(matches!(err, ProvisionError::BadConfig(_)));
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[test]
fn test_concurrent_provisions_never_share_a_directory() {
    let root = TempDir::new().unwrap();
    let engine = Arc::new(engine_for(&root, "node-a"));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let req = request(&root, &format!("pvc-{i}")).claim("shared");
            thread::spawn(move || engine.provision(&req).unwrap().path().to_path_buf())
        })
        .collect();

    let paths: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(paths.len(), 16);
    assert!(paths.iter().all(|p| p.is_dir()));
}

#[test]
fn test_ownership_matrix() {
    let root = TempDir::new().unwrap();
    let engine = engine_for(&root, "node-a");

    let volume = engine.provision(&request(&root, "pvc-1")).unwrap();

    // no marker
    let mut unmarked = volume.descriptor.clone();
    unmarked.annotations.clear();
    let outcome = engine.delete(&VolumeRecord::from_descriptor(&unmarked));
    assert!(outcome.is_ignored());

    // someone else's marker
    let mut foreign = volume.descriptor.clone();
    foreign.annotations = BTreeMap::from([(OWNER_ANNOTATION.to_string(), "node-b".to_string())]);
    let outcome = engine.delete(&VolumeRecord::from_descriptor(&foreign));
    assert!(outcome.is_ignored());

    // ours, but retained
    let mut retained = volume.record.clone();
    retained.reclaim_policy = ReclaimPolicy::Retain;
    let outcome = engine.delete(&retained);
    assert_eq!(outcome.phase(), Some(VolumePhase::Retained));
    assert!(volume.path().is_dir());

    // ours, delete policy
    let outcome = engine.delete(&volume.record);
    assert!(matches!(outcome, DeleteOutcome::Deleted));
    assert!(!volume.path().exists());
}

#[test]
fn test_ignored_delete_is_distinguishable_error() {
    let root = TempDir::new().unwrap();
    let ours = engine_for(&root, "node-a");
    let theirs = engine_for(&root, "node-b");

    let volume = ours.provision(&request(&root, "pvc-1")).unwrap();
    let err = theirs.delete(&volume.record).into_result().unwrap_err();
    assert!(err.is_ignored());
    assert!(!err.is_retryable());
}

#[test]
fn test_tampered_path_is_not_removed() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let victim = elsewhere.path().join("important");
    fs::create_dir(&victim).unwrap();

    let engine = engine_for(&root, "node-a");
    let mut record = engine.provision(&request(&root, "pvc-1")).unwrap().record;

    for tampered in [
        victim.join("..").join("..").join("important"),
        PathBuf::from("relative/important"),
        PathBuf::from("/tmp"),
    ] {
        record.on_disk_path = tampered.clone();
        let outcome = engine.delete(&record);
        assert!(
            matches!(outcome, DeleteOutcome::Failed(DeleteFailure::UnsafePath { .. })),
            "{} must not be removed",
            tampered.display()
        );
    }
    assert!(victim.is_dir());
}

#[test]
fn test_delete_survives_root_moving_to_sibling() {
    let top = TempDir::new().unwrap();
    let old_root = top.path().join("old");
    let new_root = top.path().join("new");
    let pv_dir = |dir: &PathBuf| HashMap::from([("pvDir".to_string(), dir.display().to_string())]);

    let policies = Arc::new(InMemoryPolicySource::new().with_class(CLASS, pv_dir(&old_root)));
    let engine = ProvisioningEngine::new(EngineSettings::new("node-a"), policies.clone()).unwrap();

    let mut req = request(&top, "pvc-1");
    req.parameters = pv_dir(&old_root);
    let volume = engine.provision(&req).unwrap();
    assert!(volume.path().starts_with(&old_root));

    policies.insert(CLASS, pv_dir(&new_root));

    let outcome = engine.delete(&volume.record);
    assert!(outcome.is_deleted(), "got {outcome:?}");
    assert!(!volume.path().exists());
    assert!(old_root.join("ns").is_dir());
}

#[test]
fn test_delete_uses_stored_path_after_root_changes() {
    let top = TempDir::new().unwrap();
    let old_root = top.path().join("old");
    let policies = Arc::new(InMemoryPolicySource::new());
    policies.insert(
        CLASS,
        HashMap::from([("pvDir".to_string(), old_root.display().to_string())]),
    );
    let engine = ProvisioningEngine::new(EngineSettings::new("node-a"), policies.clone()).unwrap();

    let mut req = request(&top, "pvc-1");
    req.parameters = HashMap::from([("pvDir".to_string(), old_root.display().to_string())]);
    let volume = engine.provision(&req).unwrap();

    // class now points one level up; a recomputed path would be <top>/ns/pvc-1
    policies.insert(CLASS, class_params(&top));
    let decoy = top.path().join("ns").join("pvc-1");
    fs::create_dir_all(&decoy).unwrap();

    assert!(engine.delete(&volume.record).is_deleted());
    assert!(!volume.path().exists());
    assert!(decoy.is_dir());
}

#[test]
fn test_unreachable_policy_fails_without_touching_disk() {
    let root = TempDir::new().unwrap();
    let policies = InMemoryPolicySource::new();
    let engine =
        ProvisioningEngine::new(EngineSettings::new("node-a"), Arc::new(policies)).unwrap();

    let volume = engine.provision(&request(&root, "pvc-1")).unwrap();
    let outcome = engine.delete(&volume.record);
    assert!(matches!(
        outcome,
        DeleteOutcome::Failed(DeleteFailure::PolicyUnavailable { .. })
    ));
    assert!(volume.path().is_dir());
}
