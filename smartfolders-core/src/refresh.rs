//! Background refresher: at most one in-flight refresh per cache key,
//! enforced across every process sharing the cache database

use crate::cache::{CacheStore, FOLDER_LIST_KEY};
use crate::folder::{contents_cache_key, sort_folder_list};
use crate::gateway::IndexGateway;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a claim is trusted before a new refresher may take it over.
/// Refreshes finish in seconds; anything older is a crashed worker.
pub const CLAIM_TTL: Duration = Duration::from_secs(60);

/// One unit of refresh work. Serializable so a host can hand it to a
/// separate worker process over argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTask {
    FolderList,
    FolderContents { folder_path: String },
}

impl RefreshTask {
    /// The cache key this task replaces, which is also its claim key.
    pub fn cache_key(&self) -> String {
        match self {
            RefreshTask::FolderList => FOLDER_LIST_KEY.to_string(),
            RefreshTask::FolderContents { folder_path } => contents_cache_key(folder_path),
        }
    }
}

/// Where claimed tasks actually run. The request path only claims and
/// submits; the executor decides the execution vehicle (a thread in-process,
/// or a detached worker process that outlives a short-lived host).
pub trait RefreshExecutor: Send + Sync {
    fn submit(&self, task: RefreshTask) -> crate::Result<()>;
}

/// Decouples refreshes from the request path. The request path never blocks
/// on a refresh; callers that observe `is_running` signal "re-invoke me
/// shortly" to their host instead.
pub struct Refresher {
    cache: Arc<CacheStore>,
    executor: Arc<dyn RefreshExecutor>,
}

impl Refresher {
    pub fn new(cache: Arc<CacheStore>, executor: Arc<dyn RefreshExecutor>) -> Self {
        Self { cache, executor }
    }

    /// True while a refresh for `key` is in flight, in this or any other
    /// process sharing the cache database.
    pub fn is_running(&self, key: &str) -> bool {
        self.cache.is_claimed(key, CLAIM_TTL).unwrap_or(false)
    }

    /// Claim `task`'s key and submit it to the executor, unless a refresh
    /// for that key is already in flight somewhere; then the request is
    /// dropped silently (the existing run will satisfy it). Returns whether
    /// a refresh was started.
    pub fn run_in_background(&self, task: RefreshTask) -> bool {
        let key = task.cache_key();
        match self.cache.try_claim(&key, CLAIM_TTL) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                tracing::warn!(%key, error = %err, "could not claim refresh");
                return false;
            }
        }
        if let Err(err) = self.executor.submit(task) {
            tracing::warn!(%key, error = %err, "could not submit refresh");
            if let Err(err) = self.cache.release_claim(&key) {
                tracing::warn!(%key, error = %err, "could not release claim");
            }
            return false;
        }
        true
    }
}

/// Execute a task whose claim is already held, then release the claim.
///
/// Failures are logged and never propagated: a failed refresh leaves the
/// cache entry untouched and is retried on the next staleness check.
pub fn run_claimed(task: &RefreshTask, cache: &CacheStore, gateway: &dyn IndexGateway) {
    let key = task.cache_key();
    match perform(task, cache, gateway) {
        Ok(()) => tracing::debug!(%key, "background refresh completed"),
        Err(err) => tracing::warn!(%key, error = %err, "background refresh failed"),
    }
    if let Err(err) = cache.release_claim(&key) {
        tracing::warn!(%key, error = %err, "could not release claim");
    }
}

fn perform(task: &RefreshTask, cache: &CacheStore, gateway: &dyn IndexGateway) -> crate::Result<()> {
    match task {
        RefreshTask::FolderList => {
            let mut folders = gateway.discover_folders()?;
            sort_folder_list(&mut folders);
            tracing::debug!(count = folders.len(), "rescanned smart folders");
            cache.put_json(FOLDER_LIST_KEY, &folders)
        }
        RefreshTask::FolderContents { folder_path } => {
            let contents = gateway.list_contents(folder_path)?;
            tracing::debug!(%folder_path, count = contents.len(), "rescanned folder contents");
            cache.put_json(&contents_cache_key(folder_path), &contents)
        }
    }
}

/// In-process executor: runs each claimed task on its own thread. Suits
/// long-lived hosts; one-shot hosts substitute an executor that detaches a
/// worker process instead.
pub struct ThreadExecutor {
    cache: Arc<CacheStore>,
    gateway: Arc<dyn IndexGateway>,
}

impl ThreadExecutor {
    pub fn new(cache: Arc<CacheStore>, gateway: Arc<dyn IndexGateway>) -> Self {
        Self { cache, gateway }
    }
}

impl RefreshExecutor for ThreadExecutor {
    fn submit(&self, task: RefreshTask) -> crate::Result<()> {
        let cache = Arc::clone(&self.cache);
        let gateway = Arc::clone(&self.gateway);
        thread::spawn(move || run_claimed(&task, &cache, &*gateway));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SmartFoldersError;
    use crate::folder::SmartFolder;
    use crossbeam_channel::Receiver;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct GatedGateway {
        gate: Option<Receiver<()>>,
        folders: Vec<SmartFolder>,
        contents: HashMap<String, Vec<String>>,
        discover_calls: AtomicUsize,
        fail_discovery: bool,
    }

    impl GatedGateway {
        fn new(folders: Vec<SmartFolder>) -> Self {
            Self {
                gate: None,
                folders,
                contents: HashMap::new(),
                discover_calls: AtomicUsize::new(0),
                fail_discovery: false,
            }
        }
    }

    impl IndexGateway for GatedGateway {
        fn discover_folders(&self) -> crate::Result<Vec<SmartFolder>> {
            if let Some(gate) = &self.gate {
                gate.recv().ok();
            }
            self.discover_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_discovery {
                return Err(SmartFoldersError::Gateway("index unreachable".to_string()));
            }
            Ok(self.folders.clone())
        }

        fn list_contents(&self, folder_path: &str) -> crate::Result<Vec<String>> {
            Ok(self.contents.get(folder_path).cloned().unwrap_or_default())
        }
    }

    fn refresher_over(
        cache: &Arc<CacheStore>,
        gateway: &Arc<GatedGateway>,
    ) -> Refresher {
        let executor = Arc::new(ThreadExecutor::new(
            Arc::clone(cache),
            Arc::clone(gateway) as Arc<dyn IndexGateway>,
        ));
        Refresher::new(Arc::clone(cache), executor)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..250 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not met within 5s");
    }

    #[test]
    fn task_maps_to_its_cache_key() {
        assert_eq!(RefreshTask::FolderList.cache_key(), FOLDER_LIST_KEY);
        let task = RefreshTask::FolderContents {
            folder_path: "/saved/Projects.savedSearch".to_string(),
        };
        assert_eq!(task.cache_key(), contents_cache_key("/saved/Projects.savedSearch"));
    }

    #[test]
    fn task_survives_argv_serialization() {
        let task = RefreshTask::FolderContents {
            folder_path: "/saved/Projects.savedSearch".to_string(),
        };
        let wire = serde_json::to_string(&task).unwrap();
        let back: RefreshTask = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn second_request_for_same_key_is_dropped() {
        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let (release, gate) = crossbeam_channel::bounded::<()>(0);
        let mut gateway = GatedGateway::new(vec![SmartFolder::from_path("/a/P.savedSearch")]);
        gateway.gate = Some(gate);
        let gateway = Arc::new(gateway);
        let refresher = refresher_over(&cache, &gateway);

        assert!(refresher.run_in_background(RefreshTask::FolderList));
        assert!(refresher.is_running(FOLDER_LIST_KEY));
        assert!(!refresher.run_in_background(RefreshTask::FolderList));

        release.send(()).unwrap();
        wait_until(|| !refresher.is_running(FOLDER_LIST_KEY));
        // Exactly one execution: the dropped request never ran.
        assert_eq!(gateway.discover_calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(FOLDER_LIST_KEY).unwrap().is_some());
    }

    #[test]
    fn overlapping_refreshers_share_one_refresh() {
        // Two refreshers over the same database, as two concurrent host
        // invocations would be. The claim lives in the database, so the
        // second invocation sees the first one's refresh.
        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let (release, gate) = crossbeam_channel::bounded::<()>(0);
        let mut gateway = GatedGateway::new(vec![SmartFolder::from_path("/a/P.savedSearch")]);
        gateway.gate = Some(gate);
        let gateway = Arc::new(gateway);

        let first = refresher_over(&cache, &gateway);
        let second = refresher_over(&cache, &gateway);

        assert!(first.run_in_background(RefreshTask::FolderList));
        assert!(second.is_running(FOLDER_LIST_KEY));
        assert!(!second.run_in_background(RefreshTask::FolderList));

        release.send(()).unwrap();
        wait_until(|| !second.is_running(FOLDER_LIST_KEY));
        assert_eq!(gateway.discover_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_keys_refresh_concurrently() {
        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let (release, gate) = crossbeam_channel::bounded::<()>(0);
        let mut gateway = GatedGateway::new(vec![SmartFolder::from_path("/a/P.savedSearch")]);
        gateway.gate = Some(gate);
        let gateway = Arc::new(gateway);
        let refresher = refresher_over(&cache, &gateway);

        let contents = RefreshTask::FolderContents {
            folder_path: "/a/P.savedSearch".to_string(),
        };
        assert!(refresher.run_in_background(RefreshTask::FolderList));
        assert!(refresher.run_in_background(contents.clone()));
        assert!(refresher.is_running(FOLDER_LIST_KEY));

        // Contents listing is not gated, so it completes independently of
        // the still-blocked folder scan.
        wait_until(|| !refresher.is_running(&contents.cache_key()));
        assert!(refresher.is_running(FOLDER_LIST_KEY));

        release.send(()).unwrap();
        wait_until(|| !refresher.is_running(FOLDER_LIST_KEY));
    }

    #[test]
    fn key_is_cleared_after_failure_and_can_rerun() {
        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let mut gateway = GatedGateway::new(Vec::new());
        gateway.fail_discovery = true;
        let gateway = Arc::new(gateway);
        let refresher = refresher_over(&cache, &gateway);

        assert!(refresher.run_in_background(RefreshTask::FolderList));
        wait_until(|| !refresher.is_running(FOLDER_LIST_KEY));
        // Failure left no snapshot behind, and the key is claimable again.
        assert!(cache.get(FOLDER_LIST_KEY).unwrap().is_none());
        assert!(refresher.run_in_background(RefreshTask::FolderList));
        wait_until(|| gateway.discover_calls.load(Ordering::SeqCst) == 2);
    }

    #[test]
    fn failed_submit_releases_the_claim() {
        struct RefusingExecutor;
        impl RefreshExecutor for RefusingExecutor {
            fn submit(&self, _task: RefreshTask) -> crate::Result<()> {
                Err(SmartFoldersError::Gateway("spawn failed".to_string()))
            }
        }

        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let refresher = Refresher::new(Arc::clone(&cache), Arc::new(RefusingExecutor));
        assert!(!refresher.run_in_background(RefreshTask::FolderList));
        assert!(!refresher.is_running(FOLDER_LIST_KEY));
    }

    #[test]
    fn run_claimed_writes_snapshot_and_releases() {
        let cache = CacheStore::open_in_memory().unwrap();
        cache.try_claim(FOLDER_LIST_KEY, CLAIM_TTL).unwrap();
        let gateway = GatedGateway::new(vec![
            SmartFolder::from_path("/b/Receipts.savedSearch"),
            SmartFolder::from_path("/a/Projects.savedSearch"),
        ]);

        run_claimed(&RefreshTask::FolderList, &cache, &gateway);

        let folders: Vec<SmartFolder> = cache.get_json(FOLDER_LIST_KEY).unwrap().unwrap();
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Projects", "Receipts"]);
        assert!(!cache.is_claimed(FOLDER_LIST_KEY, CLAIM_TTL).unwrap());
    }

    #[test]
    fn is_running_false_for_unknown_key() {
        let cache = Arc::new(CacheStore::open_in_memory().unwrap());
        let gateway = Arc::new(GatedGateway::new(Vec::new()));
        let refresher = refresher_over(&cache, &gateway);
        assert!(!refresher.is_running(FOLDER_LIST_KEY));
    }
}
