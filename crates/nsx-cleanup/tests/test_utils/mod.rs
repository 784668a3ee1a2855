//! Shared test utilities for integration tests
//!
//! In-memory stand-ins for the NSX manager and for resource-owning
//! collaborators. Every fake appends to a shared [`EventLog`] so tests can
//! assert on call order across phases.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use nsx_cleanup::nsx::PolicyObject;
use nsx_cleanup::{
    CleanupBeforeVpcDeletion, CleanupInfra, CleanupVpcChildren, NsxClient, TeardownContext,
    VpcService,
};
use nsx_cleanup_common::{LbResourceKind, Tag};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_CLUSTER: &str = "test-cluster";

/// Ordered record of calls made by the fakes
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().position(|e| e.starts_with(prefix))
    }

    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().rposition(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Build a policy object of `kind` tagged for [`TEST_CLUSTER`]
pub fn tagged_object(kind: LbResourceKind, id: &str) -> PolicyObject {
    PolicyObject::new(kind, id, format!("/infra/{}/{id}", kind.resource_type()))
        .with_tags(kind.discovery_tags(TEST_CLUSTER))
}

/// In-memory NSX manager
///
/// Searches filter stored objects by tag; hierarchical updates remove every
/// object marked for delete; single deletes remove one object.
#[derive(Default)]
pub struct FakeNsxClient {
    objects: Mutex<HashMap<LbResourceKind, Vec<PolicyObject>>>,
    searches: Mutex<HashMap<LbResourceKind, usize>>,
    fail_updates: Mutex<HashSet<LbResourceKind>>,
    fail_deletes: Mutex<HashSet<LbResourceKind>>,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub log: EventLog,
}

impl FakeNsxClient {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Store `count` tagged objects of `kind`
    pub fn seed(&self, kind: LbResourceKind, count: usize) {
        let mut objects = self.objects.lock().unwrap();
        let entry = objects.entry(kind).or_default();
        for i in 0..count {
            entry.push(tagged_object(kind, &format!("{}-{i}", kind.resource_type())));
        }
    }

    /// Seed one object of every family
    pub fn seed_all(&self, count: usize) {
        for kind in LbResourceKind::ALL {
            self.seed(kind, count);
        }
    }

    /// Make every hierarchical update touching `kind` fail with "server error"
    pub fn fail_updates_for(&self, kind: LbResourceKind) {
        self.fail_updates.lock().unwrap().insert(kind);
    }

    /// Make every single delete of a `kind` object fail with "server error"
    pub fn fail_deletes_for(&self, kind: LbResourceKind) {
        self.fail_deletes.lock().unwrap().insert(kind);
    }

    /// Inject a "server error" on whichever call removes `kind` objects
    pub fn fail_family(&self, kind: LbResourceKind) {
        if kind.supports_bulk_delete() {
            self.fail_updates_for(kind);
        } else {
            self.fail_deletes_for(kind);
        }
    }

    pub fn remaining(&self, kind: LbResourceKind) -> usize {
        self.objects.lock().unwrap().get(&kind).map_or(0, Vec::len)
    }

    pub fn total_remaining(&self) -> usize {
        self.objects.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn searches(&self, kind: LbResourceKind) -> usize {
        self.searches.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    fn remove(&self, object: &PolicyObject) {
        if let Some(kind) = object.kind() {
            if let Some(stored) = self.objects.lock().unwrap().get_mut(&kind) {
                stored.retain(|o| o.path != object.path);
            }
        }
    }
}

#[async_trait]
impl NsxClient for FakeNsxClient {
    async fn search(&self, kind: LbResourceKind, tags: &[Tag]) -> Result<Vec<PolicyObject>> {
        *self.searches.lock().unwrap().entry(kind).or_default() += 1;
        self.log.push(format!("search:{kind}"));
        tokio::task::yield_now().await;

        let objects = self.objects.lock().unwrap();
        Ok(objects
            .get(&kind)
            .map(|stored| stored.iter().filter(|o| o.has_tags(tags)).cloned().collect())
            .unwrap_or_default())
    }

    async fn hierarchical_update(&self, objects: &[PolicyObject]) -> Result<()> {
        let failing = self.fail_updates.lock().unwrap().clone();
        if objects
            .iter()
            .any(|o| o.kind().is_some_and(|k| failing.contains(&k)))
        {
            return Err(anyhow!("server error"));
        }

        self.updates.fetch_add(1, Ordering::SeqCst);
        for object in objects {
            self.log.push(format!("update:{}", object.resource_type));
            if object.marked_for_delete {
                self.remove(object);
            }
        }
        Ok(())
    }

    async fn delete(&self, object: &PolicyObject) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("delete:{}", object.resource_type));
        if object
            .kind()
            .is_some_and(|k| self.fail_deletes.lock().unwrap().contains(&k))
        {
            return Err(anyhow!("server error"));
        }
        self.remove(object);
        Ok(())
    }
}

/// Collaborator filling all three cleanup roles
///
/// Logs `pre:<name>`, `children:<name>:<path>` and `infra:<name>`. Each role
/// fails the first `fail_*` calls with a transient error.
pub struct RecordingCleaner {
    pub name: String,
    pub log: EventLog,
    pub pre_calls: AtomicUsize,
    pub children_calls: AtomicUsize,
    pub infra_calls: AtomicUsize,
    pub fail_pre: AtomicUsize,
    pub fail_children: AtomicUsize,
    pub fail_infra: AtomicUsize,
}

impl RecordingCleaner {
    pub fn new(name: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            pre_calls: AtomicUsize::new(0),
            children_calls: AtomicUsize::new(0),
            infra_calls: AtomicUsize::new(0),
            fail_pre: AtomicUsize::new(0),
            fail_children: AtomicUsize::new(0),
            fail_infra: AtomicUsize::new(0),
        }
    }

    pub fn failing_pre(self, times: usize) -> Self {
        self.fail_pre.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_children(self, times: usize) -> Self {
        self.fail_children.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_infra(self, times: usize) -> Self {
        self.fail_infra.store(times, Ordering::SeqCst);
        self
    }
}

/// Consume one injected failure, if any are left
fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CleanupBeforeVpcDeletion for RecordingCleaner {
    async fn cleanup_before_vpc_deletion(&self, _ctx: &TeardownContext) -> Result<()> {
        self.pre_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("pre:{}", self.name));
        if take_failure(&self.fail_pre) {
            return Err(anyhow!("{}: transient pre-cleanup failure", self.name));
        }
        Ok(())
    }
}

#[async_trait]
impl CleanupVpcChildren for RecordingCleaner {
    async fn cleanup_vpc_child_resources(
        &self,
        _ctx: &TeardownContext,
        vpc_path: &str,
    ) -> Result<()> {
        self.children_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("children:{}:{vpc_path}", self.name));
        if take_failure(&self.fail_children) {
            return Err(anyhow!("{}: transient children failure", self.name));
        }
        Ok(())
    }
}

#[async_trait]
impl CleanupInfra for RecordingCleaner {
    async fn cleanup_infra_resources(&self, _ctx: &TeardownContext) -> Result<()> {
        self.infra_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("infra:{}", self.name));
        if take_failure(&self.fail_infra) {
            return Err(anyhow!("{}: transient infra failure", self.name));
        }
        Ok(())
    }
}

/// VPC-owning collaborator backed by a set of paths
///
/// Deleted paths disappear from later listings. Paths in `failing` never
/// delete. Tracks attempts per path and the peak number of concurrent
/// deletes.
#[derive(Default)]
pub struct FakeVpcService {
    paths: Mutex<HashSet<String>>,
    failing: HashSet<String>,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub delete_latency: Duration,
    pub log: EventLog,
}

impl FakeVpcService {
    pub fn new(paths: impl IntoIterator<Item = String>, log: EventLog) -> Self {
        Self {
            paths: Mutex::new(paths.into_iter().collect()),
            log,
            ..Default::default()
        }
    }

    pub fn with_failing(mut self, failing: impl IntoIterator<Item = String>) -> Self {
        self.failing = failing.into_iter().collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    pub fn attempts(&self, path: &str) -> usize {
        self.attempts.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn attempted_paths(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.paths.lock().unwrap().len()
    }
}

/// Paths `/orgs/default/projects/p1/vpcs/vpc-<i>` for `0..n`
pub fn vpc_paths(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("/orgs/default/projects/p1/vpcs/vpc-{i}"))
        .collect()
}

#[async_trait]
impl VpcService for FakeVpcService {
    fn list_auto_created_vpc_paths(&self) -> HashSet<String> {
        self.paths.lock().unwrap().clone()
    }

    async fn delete_vpc(&self, ctx: &TeardownContext, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        ctx.check()?;

        *self.attempts.lock().unwrap().entry(path.to_string()).or_default() += 1;
        self.log.push(format!("delete_vpc:{path}"));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delete_latency.is_zero() {
            tokio::time::sleep(self.delete_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(path) {
            return Err(anyhow!("VPC {path} still has attached resources"));
        }
        self.paths.lock().unwrap().remove(path);
        Ok(())
    }
}
