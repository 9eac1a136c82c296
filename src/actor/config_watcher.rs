use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

use crate::actor::grouper::{self, Event as GrouperEvent};
use crate::common::config::Config;

/// Re-reads the config file when it changes and hands the sanitized result
/// to the grouper. Stops once the grouper is gone.
pub struct ConfigWatcher {
    file: PathBuf,
    grouper_tx: grouper::Sender,
}

impl ConfigWatcher {
    pub fn spawn(
        file: PathBuf,
        grouper_tx: grouper::Sender,
        poll_interval: Duration,
    ) -> std::io::Result<()> {
        thread::Builder::new().name("config-watcher".to_string()).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("config-watcher: failed to build runtime: {e}");
                    return;
                }
            };
            let watcher = ConfigWatcher { file, grouper_tx };
            if let Err(e) = runtime.block_on(watcher.run(poll_interval)) {
                warn!("config-watcher: {e}");
            }
        })?;
        Ok(())
    }

    async fn run(self, poll_interval: Duration) -> notify::Result<()> {
        let (tx, mut changes) = tokio::sync::mpsc::unbounded_channel();
        let mut poller = PollWatcher::new(
            move |change: notify::Result<Event>| {
                _ = tx.send(change);
            },
            NotifyConfig::default()
                .with_poll_interval(poll_interval)
                .with_compare_contents(true),
        )?;
        poller.watch(&self.file, RecursiveMode::NonRecursive)?;
        info!(file = %self.file.display(), "watching config");

        loop {
            let change = tokio::select! {
                _ = self.grouper_tx.closed() => break,
                change = changes.recv() => change,
            };
            match change {
                Some(Ok(event)) if self.is_relevant(&event) => self.reload(),
                Some(Ok(event)) => trace!(kind = ?event.kind, "unrelated change"),
                Some(Err(e)) => warn!("watch error: {e}"),
                None => break,
            }
        }
        debug!("config watcher stopped");
        Ok(())
    }

    fn is_relevant(&self, event: &Event) -> bool {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => event
                .paths
                .iter()
                .any(|p| p == &self.file || p.file_name() == self.file.file_name()),
            _ => false,
        }
    }

    fn reload(&self) {
        match load(&self.file) {
            Some(config) => {
                info!(file = %self.file.display(), "config reloaded");
                self.grouper_tx.send(GrouperEvent::ConfigUpdated(Box::new(config)));
            }
            None => warn!("keeping previous settings"),
        }
    }
}

/// Reads and sanitizes the config, or `None` if it cannot be used.
fn load(file: &Path) -> Option<Config> {
    let mut config = match Config::read_or_default(file) {
        Ok(config) => config,
        Err(e) => {
            warn!("failed to read {}: {e:#}", file.display());
            return None;
        }
    };
    for issue in config.validate() {
        warn!("config: {issue}");
    }
    config.auto_fix_values();
    Some(config)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn load_fixes_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.toml");
        std::fs::write(&path, "[settings.detector]\nedge_tolerance = 90.0\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.settings.detector.edge_tolerance, 40.0);
    }

    #[test]
    fn load_rejects_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.toml");
        std::fs::write(&path, "[settings]\nauto_grouping = \"maybe\"\n").unwrap();
        assert_eq!(load(&path), None);

        // A deleted file falls back to the defaults.
        assert_eq!(load(&dir.path().join("missing.toml")), Some(Config::default()));
    }

    #[test]
    fn only_changes_to_the_config_file_count() {
        let (tx, _rx) = crate::actor::channel();
        let watcher = ConfigWatcher {
            file: PathBuf::from("/home/user/.tandem.toml"),
            grouper_tx: tx,
        };
        let modify = |path: &str| {
            Event::new(EventKind::Modify(notify::event::ModifyKind::Any)).add_path(PathBuf::from(path))
        };
        assert!(watcher.is_relevant(&modify("/home/user/.tandem.toml")));
        assert!(!watcher.is_relevant(&modify("/home/user/.bashrc")));
        assert!(!watcher.is_relevant(
            &Event::new(EventKind::Access(notify::event::AccessKind::Any))
                .add_path(PathBuf::from("/home/user/.tandem.toml"))
        ));
    }
}
