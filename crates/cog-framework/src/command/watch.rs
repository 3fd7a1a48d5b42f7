//! Development-mode hot reload of a commands folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::catalog::CommandCatalog;
use super::manifest::{HandlerRegistry, is_manifest, load_manifest};
use crate::error::{CatalogError, CatalogResult};
use crate::reporter::{ErrorReporter, ReportContext};

/// A running folder watch. Dropping it stops the watcher and its task.
pub struct FolderWatch {
    path: PathBuf,
    token: CancellationToken,
    _watcher: RecommendedWatcher,
}

impl FolderWatch {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for FolderWatch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl CommandCatalog {
    /// Watches `dir` and keeps the catalog in sync with its manifests.
    ///
    /// Created or modified manifests are reloaded and swapped in; removed
    /// ones are unloaded. Reload failures go to `reporter` and leave the
    /// previous entry in place. Must be called inside a Tokio runtime.
    pub fn watch_folder(
        self: &Arc<Self>,
        dir: &Path,
        handlers: HandlerRegistry,
        reporter: Arc<ErrorReporter>,
    ) -> CatalogResult<FolderWatch> {
        let watch_error = |reason: String| CatalogError::Watch {
            path: dir.to_path_buf(),
            reason,
        };
        let runtime = Handle::try_current().map_err(|e| watch_error(e.to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "Command watcher error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| watch_error(e.to_string()))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(e.to_string()))?;

        let token = CancellationToken::new();
        let task_token = token.clone();
        let catalog = Arc::clone(self);
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => catalog.apply_watch_event(&event, &handlers, &reporter),
                        None => break,
                    },
                }
            }
            debug!("Command watcher stopped");
        });

        info!(path = %dir.display(), "Watching commands folder");
        Ok(FolderWatch {
            path: dir.to_path_buf(),
            token,
            _watcher: watcher,
        })
    }

    fn apply_watch_event(
        &self,
        event: &Event,
        handlers: &HandlerRegistry,
        reporter: &ErrorReporter,
    ) {
        for path in event.paths.iter().filter(|p| is_manifest(p)) {
            if event.kind.is_remove() || !path.exists() {
                let removed = self.remove_source(path);
                if !removed.is_empty() {
                    info!(path = %path.display(), commands = ?removed, "Unloaded commands");
                }
                continue;
            }
            if !(event.kind.is_create() || event.kind.is_modify()) {
                continue;
            }

            trace!(path = %path.display(), kind = ?event.kind, "Manifest changed");
            match load_manifest(path, handlers) {
                Ok(def) => {
                    let key = def.key();
                    let replaced = self.set(def).is_some();
                    info!(command = %key, replaced, "Reloaded command");
                }
                Err(err) => {
                    let context =
                        ReportContext::new(err.kind()).subject(path.display().to_string());
                    reporter.handle_error(&err, context);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandDefinition};
    use crate::router::ExecutionRequest;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl Command for Noop {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_watch_requires_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(CommandCatalog::new());
        let result = catalog.watch_folder(
            dir.path(),
            HandlerRegistry::new(),
            Arc::new(ErrorReporter::new()),
        );
        assert!(matches!(result, Err(CatalogError::Watch { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_loads_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let handlers = HandlerRegistry::new();
        handlers.register("noop", || Ok(CommandDefinition::new(Noop)));
        let catalog = Arc::new(CommandCatalog::new());

        let watch = catalog
            .watch_folder(dir.path(), handlers, Arc::new(ErrorReporter::new()))
            .unwrap();
        assert_eq!(watch.path(), dir.path());

        let path = dir.path().join("noop.json");
        std::fs::write(&path, r#"{"name": "hello"}"#).unwrap();
        assert!(wait_for(|| catalog.get("hello").is_some()).await);

        std::fs::remove_file(&path).unwrap();
        assert!(wait_for(|| catalog.get("hello").is_none()).await);
    }
}
