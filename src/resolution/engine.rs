//! Update resolution engine.
//!
//! Runs resolution cycles over the configured components: fetch a snapshot
//! through the component's provider, resolve the remote version, decide the
//! state and cache the result. Each component's failure stays with that
//! component.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::component::Component;
use crate::provider::{Provider, ProviderFactory, RepositoryMetadata};
use crate::store::StateStore;

use super::ResolveError;
use super::decider::{UpdateDecider, UpdateState};
use super::resolver::VersionResolver;
use super::rollback::RollbackList;

/// Default bound on one component's fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Last known status of a component.
///
/// `decision` is the most recent successful decision. `last_error` is set
/// when the most recent cycle failed, in which case `decision` is stale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub decision: Option<UpdateState>,
    pub last_error: Option<ResolveError>,
}

impl ComponentStatus {
    pub fn is_stale(&self) -> bool {
        self.decision.is_some() && self.last_error.is_some()
    }
}

/// Outcome of one component within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<UpdateState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResolveError>,
}

impl CycleOutcome {
    fn new(component: &str, result: Result<UpdateState, ResolveError>) -> Self {
        let (state, error) = match result {
            Ok(state) => (Some(state), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            component: component.to_string(),
            state,
            error,
        }
    }
}

/// Outcomes of a full cycle, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CycleReport {
    pub outcomes: Vec<CycleOutcome>,
}

impl CycleReport {
    pub fn get(&self, component: &str) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|o| o.component == component)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

struct Managed {
    component: Component,
    provider: Arc<dyn Provider>,
    /// Serializes cycles of this component.
    cycle_lock: Mutex<()>,
}

pub struct UpdateEngine {
    components: Vec<Managed>,
    fetch_timeout: Duration,
    statuses: RwLock<HashMap<String, ComponentStatus>>,
    store: Option<Arc<dyn StateStore>>,
}

impl UpdateEngine {
    /// Bind each component to its provider. Component ids must be unique.
    pub fn new(
        components: Vec<Component>,
        factory: &ProviderFactory,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for component in &components {
            if !seen.insert(component.id.clone()) {
                bail!("Duplicate component id: {}", component.id);
            }
        }

        let components = components
            .into_iter()
            .map(|component| Managed {
                provider: factory.provider_for(component.provider),
                component,
                cycle_lock: Mutex::new(()),
            })
            .collect();

        Ok(Self {
            components,
            fetch_timeout,
            statuses: RwLock::new(HashMap::new()),
            store: None,
        })
    }

    /// Attach a durable store and seed the cache from it.
    ///
    /// Entries for components that are no longer configured are dropped. An
    /// unreadable store starts the cache empty; the next save replaces it.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        let mut loaded = match store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Ignoring saved component state: {:#}", e);
                HashMap::new()
            }
        };
        loaded.retain(|id, _| self.find(id).is_some());
        debug!("Loaded saved state for {} component(s)", loaded.len());

        self.statuses = RwLock::new(loaded);
        self.store = Some(store);
        self
    }

    /// Configured components, in configuration order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().map(|m| &m.component)
    }

    /// Run one cycle over every component, one after another.
    ///
    /// A component whose last failure is not retryable keeps that failure
    /// and is not fetched again until it is invalidated.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for managed in &self.components {
            let id = &managed.component.id;
            if let Some(error) = self.blocking_error(id) {
                debug!("Skipping {}: {}", id, error);
                report.outcomes.push(CycleOutcome::new(id, Err(error)));
                continue;
            }

            let result = self.resolve_managed(managed).await;
            if let Err(e) = &result {
                warn!("Failed to resolve {}: {}", id, e);
            }
            report.outcomes.push(CycleOutcome::new(id, result));
        }

        self.persist();
        report
    }

    /// Drop every cached status and run a fresh cycle.
    pub async fn force_check(&self) -> CycleReport {
        info!("Force check: invalidating cached state");
        self.invalidate_all();
        self.run_cycle().await
    }

    /// Resolve a single component and cache the decision.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, id: &str) -> Result<UpdateState, ResolveError> {
        let managed = self.managed(id)?;
        let result = self.resolve_managed(managed).await;
        self.persist();
        result
    }

    /// Download URL for any tag of a component, outside the rollback window.
    #[tracing::instrument(skip(self))]
    pub async fn download_link_for(&self, id: &str, version: &str) -> Result<String, ResolveError> {
        let managed = self.managed(id)?;
        let metadata = self.fetch_snapshot(managed).await?;

        let git_ref = UpdateDecider::find_ref(version, &metadata).ok_or_else(|| {
            ResolveError::UnknownVersion {
                component: id.to_string(),
                version: version.to_string(),
            }
        })?;

        Ok(managed
            .provider
            .download_url(&managed.component.location, &git_ref))
    }

    /// Manual rollback to `version`, bypassing normal resolution.
    ///
    /// On success the override becomes the component's decision. An unknown
    /// version leaves the cached state untouched.
    #[tracing::instrument(skip(self))]
    pub async fn request_rollback(
        &self,
        id: &str,
        version: &str,
    ) -> Result<UpdateState, ResolveError> {
        let managed = self.managed(id)?;
        let _cycle = managed.cycle_lock.lock().await;

        let metadata = self.fetch_snapshot(managed).await?;
        let state = UpdateDecider::rollback_to(
            &managed.component,
            version,
            &metadata,
            managed.provider.as_ref(),
        )?;

        info!("Rollback of {} to {} requested", id, version);
        self.record(id, Ok(state.clone()));
        self.persist();
        Ok(state)
    }

    /// Rollback targets from the last successful up-to-date decision.
    ///
    /// Empty when the last decision was an update, or nothing has run.
    pub fn rollback_candidates(&self, id: &str) -> RollbackList {
        self.status(id)
            .and_then(|s| s.decision)
            .map(|d| d.rollback())
            .unwrap_or_default()
    }

    /// Cached status of a component.
    pub fn status(&self, id: &str) -> Option<ComponentStatus> {
        self.read_statuses().get(id).cloned()
    }

    /// Cached statuses in configuration order; components never resolved
    /// report an empty status.
    pub fn statuses(&self) -> Vec<(String, ComponentStatus)> {
        let statuses = self.read_statuses();
        self.components()
            .map(|c| (c.id.clone(), statuses.get(&c.id).cloned().unwrap_or_default()))
            .collect()
    }

    /// Forget the cached status of one component.
    pub fn invalidate(&self, id: &str) {
        self.write_statuses().remove(id);
    }

    pub fn invalidate_all(&self) {
        self.write_statuses().clear();
    }

    async fn resolve_managed(&self, managed: &Managed) -> Result<UpdateState, ResolveError> {
        let _cycle = managed.cycle_lock.lock().await;
        let component = &managed.component;

        let result = match self.fetch_snapshot(managed).await {
            Ok(metadata) => VersionResolver::resolve(component, &metadata).map(|resolved| {
                debug!("{}: resolved remote version {}", component.id, resolved.label);
                UpdateDecider::decide(component, &resolved, &metadata, managed.provider.as_ref())
            }),
            Err(e) => Err(e),
        };

        self.record(&component.id, result.clone());
        result
    }

    /// Fetch this cycle's snapshot, bounded by the fetch timeout.
    async fn fetch_snapshot(&self, managed: &Managed) -> Result<RepositoryMetadata, ResolveError> {
        let component = &managed.component;
        let provider = managed.provider.as_ref();

        let fetch = async {
            let metadata = provider
                .fetch_metadata(&component.location)
                .await
                .with_context(|| format!("Failed to fetch metadata of {}", component.location))?;

            match component.tracked_branch() {
                Some(branch) => {
                    let head = provider
                        .fetch_branch_head(&component.location, branch)
                        .await
                        .with_context(|| format!("Failed to fetch branch {}", branch))?;
                    Ok::<_, anyhow::Error>(metadata.with_branch_head(head))
                }
                None => Ok(metadata),
            }
        };

        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(metadata)) => Ok(metadata),
            Ok(Err(e)) => Err(ResolveError::remote_unavailable(&component.id, &e)),
            Err(_) => Err(ResolveError::RemoteUnavailable {
                component: component.id.clone(),
                reason: format!("timed out after {:?}", self.fetch_timeout),
            }),
        }
    }

    /// Replace a component's status in one write.
    fn record(&self, id: &str, result: Result<UpdateState, ResolveError>) {
        let mut statuses = self.write_statuses();
        let previous = statuses.remove(id).unwrap_or_default();
        let status = match result {
            Ok(state) => ComponentStatus {
                decision: Some(state),
                last_error: None,
            },
            Err(e) => ComponentStatus {
                decision: previous.decision,
                last_error: Some(e),
            },
        };
        statuses.insert(id.to_string(), status);
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = self.read_statuses().clone();
        if let Err(e) = store.save(&snapshot) {
            warn!("Failed to save component state: {:#}", e);
        }
    }

    /// Cached failure that a new fetch would not change.
    fn blocking_error(&self, id: &str) -> Option<ResolveError> {
        self.read_statuses()
            .get(id)
            .and_then(|s| s.last_error.clone())
            .filter(|e| !e.is_retryable())
    }

    fn find(&self, id: &str) -> Option<&Managed> {
        self.components.iter().find(|m| m.component.id == id)
    }

    fn managed(&self, id: &str) -> Result<&Managed, ResolveError> {
        self.find(id)
            .ok_or_else(|| ResolveError::UnknownComponent {
                component: id.to_string(),
            })
    }

    fn read_statuses(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ComponentStatus>> {
        self.statuses.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_statuses(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ComponentStatus>> {
        self.statuses.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentSpec, TrackingMode};
    use crate::provider::{BranchHead, MockProvider, RepoLocation, Tag};
    use crate::store::{FileStateStore, MockStateStore};
    use async_trait::async_trait;
    use mockall::predicate::eq;

    fn component(id: &str, installed: &str, uri: &str) -> Component {
        Component::try_from(ComponentSpec {
            id: id.into(),
            installed_version: installed.into(),
            repository_uri: uri.into(),
            provider: None,
            tracking_mode: TrackingMode::Tag,
            tracked_branch: None,
        })
        .unwrap()
    }

    fn branch_component(id: &str, branch: &str) -> Component {
        Component::try_from(ComponentSpec {
            id: id.into(),
            installed_version: "1.0".into(),
            repository_uri: format!("https://github.com/owner/{}", id),
            provider: None,
            tracking_mode: TrackingMode::Branch,
            tracked_branch: Some(branch.into()),
        })
        .unwrap()
    }

    fn metadata(tags: &[&str]) -> RepositoryMetadata {
        RepositoryMetadata {
            tags: tags.iter().map(|n| Tag::new(*n, format!("sha-{}", n))).collect(),
            branch_head: BranchHead {
                name: "main".into(),
                commit_ref: "main-head".into(),
            },
        }
    }

    fn with_download_url(provider: &mut MockProvider, verb: &'static str) {
        provider
            .expect_download_url()
            .returning(move |repo: &RepoLocation, git_ref: &str| {
                format!("{}/{}/{}.zip", repo.web_url(), verb, git_ref)
            });
    }

    fn github_serving(tags: &'static [&'static str]) -> MockProvider {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_metadata()
            .returning(move |_| Ok(metadata(tags)));
        with_download_url(&mut provider, "archive");
        provider
    }

    fn factory(github: MockProvider, bitbucket: MockProvider) -> ProviderFactory {
        ProviderFactory::from_providers(Arc::new(github), Arc::new(bitbucket))
    }

    fn engine(components: Vec<Component>, github: MockProvider) -> UpdateEngine {
        UpdateEngine::new(
            components,
            &factory(github, MockProvider::new()),
            DEFAULT_FETCH_TIMEOUT,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_update_available() {
        let engine = engine(
            vec![component("theme", "v1.2.0", "https://github.com/owner/theme")],
            github_serving(&["v1.2.0", "v1.10.0", "v1.9.9"]),
        );

        let state = engine.resolve("theme").await.unwrap();
        assert_eq!(
            state,
            UpdateState::UpdateAvailable {
                new_version: "v1.10.0".into(),
                download_url: "https://github.com/owner/theme/archive/v1.10.0.zip".into(),
            }
        );
        assert!(engine.rollback_candidates("theme").is_empty());
    }

    #[tokio::test]
    async fn test_resolve_up_to_date_caches_rollback() {
        let engine = engine(
            vec![component("theme", "v3", "https://github.com/owner/theme")],
            github_serving(&["v3", "v2", "v1"]),
        );

        assert!(engine.rollback_candidates("theme").is_empty());

        let state = engine.resolve("theme").await.unwrap();
        assert!(!state.is_update_available());
        assert_eq!(engine.rollback_candidates("theme").versions(), vec!["v2", "v1"]);
    }

    #[tokio::test]
    async fn test_resolve_no_resolvable_version() {
        let engine = engine(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            github_serving(&["release-candidate"]),
        );

        let result = engine.resolve("theme").await;
        assert!(matches!(
            result,
            Err(ResolveError::NoResolvableVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_component() {
        let engine = engine(vec![], MockProvider::new());
        assert_eq!(
            engine.resolve("missing").await,
            Err(ResolveError::UnknownComponent {
                component: "missing".into()
            })
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_fetch_failure_does_not_block_other_components() {
        let mut github = MockProvider::new();
        github
            .expect_fetch_metadata()
            .withf(|repo: &RepoLocation| repo.repo == "broken")
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        github
            .expect_fetch_metadata()
            .withf(|repo: &RepoLocation| repo.repo == "healthy")
            .returning(|_| Ok(metadata(&["v2.0.0"])));
        with_download_url(&mut github, "archive");

        let engine = engine(
            vec![
                component("broken", "v1.0.0", "https://github.com/owner/broken"),
                component("healthy", "v1.0.0", "https://github.com/owner/healthy"),
            ],
            github,
        );

        let report = engine.run_cycle().await;

        let broken = report.get("broken").unwrap();
        assert!(matches!(
            broken.error,
            Some(ResolveError::RemoteUnavailable { .. })
        ));
        assert!(broken.state.is_none());

        let healthy = report.get("healthy").unwrap();
        assert!(healthy.state.as_ref().unwrap().is_update_available());
        assert_eq!(report.failures().count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_cycle_marks_previous_decision_stale() {
        let mut github = MockProvider::new();
        let mut calls = 0;
        github.expect_fetch_metadata().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(metadata(&["v1.0.0", "v0.9.0", "v0.8.0"]))
            } else {
                Err(anyhow::anyhow!("503 Service Unavailable"))
            }
        });
        with_download_url(&mut github, "archive");

        let engine = engine(
            vec![component("theme", "v1.0.0", "https://github.com/owner/theme")],
            github,
        );

        engine.resolve("theme").await.unwrap();
        let fresh = engine.status("theme").unwrap();
        assert!(!fresh.is_stale());

        assert!(engine.resolve("theme").await.is_err());
        let stale = engine.status("theme").unwrap();
        assert!(stale.is_stale());
        assert_eq!(stale.decision, fresh.decision);
        // Candidates still come from the last successful up-to-date decision
        assert_eq!(
            engine.rollback_candidates("theme").versions(),
            vec!["v0.9.0", "v0.8.0"]
        );
    }

    #[tokio::test]
    async fn test_no_resolvable_version_is_not_refetched() {
        let mut github = MockProvider::new();
        github
            .expect_fetch_metadata()
            .times(2)
            .returning(|_| Ok(metadata(&["release-candidate"])));

        let engine = engine(
            vec![component("theme", "v1.0.0", "https://github.com/owner/theme")],
            github,
        );

        for _ in 0..2 {
            let report = engine.run_cycle().await;
            assert!(matches!(
                report.get("theme").unwrap().error,
                Some(ResolveError::NoResolvableVersion { .. })
            ));
        }

        // Invalidation allows the next cycle to try again
        let report = engine.force_check().await;
        assert_eq!(report.failures().count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_corrupt_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let engine = engine(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            github_serving(&["v2"]),
        )
        .with_store(Arc::new(FileStateStore::new(&path)));
        assert!(engine.status("theme").is_none());

        engine.force_check().await;

        let saved = FileStateStore::new(&path).load().unwrap();
        assert!(saved["theme"].decision.is_some());
    }

    #[tokio::test]
    async fn test_failure_without_previous_decision_is_not_up_to_date() {
        let mut github = MockProvider::new();
        github
            .expect_fetch_metadata()
            .returning(|_| Err(anyhow::anyhow!("dns error")));

        let engine = engine(
            vec![component("theme", "v1.0.0", "https://github.com/owner/theme")],
            github,
        );

        assert!(engine.resolve("theme").await.is_err());
        let status = engine.status("theme").unwrap();
        assert!(status.decision.is_none());
        assert!(status.last_error.is_some());
        assert!(!status.is_stale());
    }

    #[tokio::test]
    async fn test_provider_selected_per_component() {
        let github = github_serving(&["v1.0.0"]);
        let mut bitbucket = MockProvider::new();
        bitbucket
            .expect_fetch_metadata()
            .returning(|_| Ok(metadata(&["v2.0.0"])));
        with_download_url(&mut bitbucket, "get");

        let engine = UpdateEngine::new(
            vec![
                component("gh", "v0.1", "https://github.com/owner/gh"),
                component("bb", "v0.1", "https://bitbucket.org/owner/bb"),
            ],
            &factory(github, bitbucket),
            DEFAULT_FETCH_TIMEOUT,
        )
        .unwrap();

        let report = engine.run_cycle().await;
        assert_eq!(
            report.get("gh").unwrap().state,
            Some(UpdateState::UpdateAvailable {
                new_version: "v1.0.0".into(),
                download_url: "https://github.com/owner/gh/archive/v1.0.0.zip".into(),
            })
        );
        assert_eq!(
            report.get("bb").unwrap().state,
            Some(UpdateState::UpdateAvailable {
                new_version: "v2.0.0".into(),
                download_url: "https://bitbucket.org/owner/bb/get/v2.0.0.zip".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_branch_mode_fetches_tracked_branch_head() {
        let mut github = MockProvider::new();
        github
            .expect_fetch_metadata()
            .returning(|_| Ok(metadata(&["v1.0"])));
        github
            .expect_fetch_branch_head()
            .with(mockall::predicate::always(), eq("develop"))
            .returning(|_, branch| {
                Ok(BranchHead {
                    name: branch.to_string(),
                    commit_ref: "dev-head".into(),
                })
            });
        with_download_url(&mut github, "archive");

        let engine = engine(vec![branch_component("theme", "develop")], github);

        let state = engine.resolve("theme").await.unwrap();
        assert_eq!(
            state,
            UpdateState::UpdateAvailable {
                new_version: "develop".into(),
                download_url: "https://github.com/owner/theme/archive/dev-head.zip".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_request_rollback_to_older_version() {
        let engine = engine(
            vec![component("theme", "v2.0.0", "https://github.com/owner/theme")],
            github_serving(&["v2.0.0", "v1.5.0", "v1.0.0"]),
        );

        engine.resolve("theme").await.unwrap();
        assert!(!engine.rollback_candidates("theme").is_empty());

        let state = engine.request_rollback("theme", "v1.0.0").await.unwrap();
        assert_eq!(
            state,
            UpdateState::UpdateAvailable {
                new_version: "v1.0.0".into(),
                download_url: "https://github.com/owner/theme/archive/v1.0.0.zip".into(),
            }
        );
        // The override is now the decision for this component
        assert!(engine.rollback_candidates("theme").is_empty());
    }

    #[tokio::test]
    async fn test_request_rollback_unknown_version_keeps_state() {
        let engine = engine(
            vec![component("theme", "v2.0.0", "https://github.com/owner/theme")],
            github_serving(&["v2.0.0", "v1.0.0"]),
        );

        engine.resolve("theme").await.unwrap();
        let before = engine.status("theme");

        let result = engine.request_rollback("theme", "v0.0.1").await;
        assert_eq!(
            result,
            Err(ResolveError::UnknownVersion {
                component: "theme".into(),
                version: "v0.0.1".into(),
            })
        );
        assert_eq!(engine.status("theme"), before);
    }

    #[tokio::test]
    async fn test_download_link_for_ignores_rollback_window() {
        let engine = engine(
            vec![component("theme", "v5", "https://github.com/owner/theme")],
            github_serving(&["v5", "v4", "v3", "v2", "v1", "legacy"]),
        );

        let url = engine.download_link_for("theme", "v1").await.unwrap();
        assert_eq!(url, "https://github.com/owner/theme/archive/v1.zip");

        let url = engine.download_link_for("theme", "legacy").await.unwrap();
        assert_eq!(url, "https://github.com/owner/theme/archive/legacy.zip");

        assert!(matches!(
            engine.download_link_for("theme", "v9").await,
            Err(ResolveError::UnknownVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_force_check_invalidates_and_reruns() {
        let engine = engine(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            github_serving(&["v1", "v0"]),
        );

        engine.run_cycle().await;
        engine.invalidate("theme");
        assert!(engine.status("theme").is_none());

        let report = engine.force_check().await;
        assert!(report.get("theme").unwrap().state.is_some());
        assert_eq!(engine.rollback_candidates("theme").versions(), vec!["v0"]);
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        async fn fetch_metadata(&self, _repo: &RepoLocation) -> Result<RepositoryMetadata> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RepositoryMetadata::default())
        }

        async fn fetch_branch_head(&self, _repo: &RepoLocation, _branch: &str) -> Result<BranchHead> {
            Ok(BranchHead::default())
        }

        fn download_url(&self, repo: &RepoLocation, git_ref: &str) -> String {
            format!("{}/archive/{}.zip", repo.web_url(), git_ref)
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_fetch_timeout_is_remote_unavailable() {
        let engine = UpdateEngine::new(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            &ProviderFactory::from_providers(Arc::new(SlowProvider), Arc::new(SlowProvider)),
            Duration::from_millis(20),
        )
        .unwrap();

        match engine.resolve("theme").await {
            Err(ResolveError::RemoteUnavailable { reason, .. }) => {
                assert!(reason.contains("timed out"))
            }
            other => panic!("Expected RemoteUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = UpdateEngine::new(
            vec![
                component("theme", "v1", "https://github.com/owner/theme"),
                component("theme", "v2", "https://github.com/owner/other"),
            ],
            &factory(MockProvider::new(), MockProvider::new()),
            DEFAULT_FETCH_TIMEOUT,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_store_seeds_and_receives_state() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|| {
            let mut saved = HashMap::new();
            saved.insert(
                "theme".to_string(),
                ComponentStatus {
                    decision: Some(UpdateState::UpToDate {
                        rollback: RollbackList::default(),
                    }),
                    last_error: None,
                },
            );
            saved.insert("removed".to_string(), ComponentStatus::default());
            Ok(saved)
        });
        store
            .expect_save()
            .withf(|statuses: &HashMap<String, ComponentStatus>| {
                statuses["theme"]
                    .decision
                    .as_ref()
                    .is_some_and(|d| d.is_update_available())
            })
            .times(1)
            .returning(|_| Ok(()));

        let engine = engine(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            github_serving(&["v2"]),
        )
        .with_store(Arc::new(store));

        assert!(engine.status("theme").is_some());
        assert!(engine.status("removed").is_none());

        engine.run_cycle().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_store_save_failure_is_not_fatal() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|| Ok(HashMap::new()));
        store
            .expect_save()
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let engine = engine(
            vec![component("theme", "v1", "https://github.com/owner/theme")],
            github_serving(&["v1"]),
        )
        .with_store(Arc::new(store));

        assert!(engine.resolve("theme").await.is_ok());
    }

    #[test]
    fn test_statuses_in_configuration_order() {
        let engine = engine(
            vec![
                component("b", "v1", "https://github.com/owner/b"),
                component("a", "v1", "https://github.com/owner/a"),
            ],
            MockProvider::new(),
        );
        let ids: Vec<String> = engine.statuses().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
