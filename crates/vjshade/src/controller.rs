use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use renderer::{Key, PluginSet, SceneController};

use crate::plugins::load_into;
use crate::scene::load_scene_file;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reloads the scene file when it changes and maps number keys to chunk toggles.
#[derive(Debug)]
pub struct SceneWatcher {
    path: Option<PathBuf>,
    last_modified: Option<SystemTime>,
    last_poll: Option<Instant>,
    poll_interval: Duration,
}

impl SceneWatcher {
    /// `path` is the scene file to poll; `None` disables reloading.
    pub fn new(path: Option<PathBuf>) -> Self {
        let last_modified = path.as_ref().and_then(|path| modified_time(path));
        Self {
            path,
            last_modified,
            last_poll: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reloads into `plugins` when the file changed since the last check.
    /// Returns whether the plugin set was replaced.
    pub fn poll(&mut self, now: Instant, plugins: &mut PluginSet) -> bool {
        let Some(path) = self.path.as_ref() else {
            return false;
        };
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.poll_interval {
                return false;
            }
        }
        self.last_poll = Some(now);

        let modified = modified_time(path);
        if modified.is_none() || modified == self.last_modified {
            return false;
        }
        self.last_modified = modified;

        match load_scene_file(path) {
            Ok(scene) => {
                load_into(plugins, &scene);
                tracing::info!(
                    path = %path.display(),
                    chunks = scene.chunks.len(),
                    "scene reloaded"
                );
                true
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "scene reload failed: {err:#}");
                false
            }
        }
    }
}

fn modified_time(path: &std::path::Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Index of the chunk a number key toggles: `1` is the first chunk.
pub fn toggle_index(key: &Key) -> Option<usize> {
    let Key::Character(value) = key else {
        return None;
    };
    let mut chars = value.chars();
    let digit = chars.next()?.to_digit(10)?;
    if chars.next().is_some() || digit == 0 {
        return None;
    }
    Some(digit as usize - 1)
}

impl SceneController for SceneWatcher {
    fn before_frame(&mut self, plugins: &mut PluginSet) {
        self.poll(Instant::now(), plugins);
    }

    fn key_pressed(&mut self, key: &Key, plugins: &mut PluginSet) {
        let Some(index) = toggle_index(key) else {
            return;
        };
        if plugins.toggle_at(index).is_none() {
            tracing::debug!(index, chunks = plugins.len(), "no chunk bound to key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::NamedKey;
    use tempfile::TempDir;

    const ONE_CHUNK: &str = "version = 1\n[[chunks]]\nkind = \"one\"\n";
    const TWO_CHUNKS: &str =
        "version = 1\n[[chunks]]\nkind = \"one\"\n[[chunks]]\nkind = \"two\"\n";

    fn bump_mtime(path: &std::path::Path, contents: &str, offset_secs: u64) {
        fs::write(path, contents).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .unwrap();
    }

    #[test]
    fn number_keys_map_to_chunk_indices() {
        assert_eq!(toggle_index(&Key::Character("1".into())), Some(0));
        assert_eq!(toggle_index(&Key::Character("9".into())), Some(8));
        assert_eq!(toggle_index(&Key::Character("0".into())), None);
        assert_eq!(toggle_index(&Key::Character("a".into())), None);
        assert_eq!(toggle_index(&Key::Named(NamedKey::Enter)), None);
    }

    #[test]
    fn key_press_toggles_and_dirties() {
        let mut watcher = SceneWatcher::new(None);
        let scene = sceneconfig::SceneConfig::from_toml_str(TWO_CHUNKS).unwrap();
        let mut plugins = crate::plugins::plugin_set_from_scene(&scene);
        assert_eq!(plugins.active().count(), 2);

        watcher.key_pressed(&Key::Character("2".into()), &mut plugins);
        assert_eq!(plugins.active().count(), 1);
        assert!(plugins.is_dirty());

        watcher.key_pressed(&Key::Character("7".into()), &mut plugins);
        assert_eq!(plugins.active().count(), 1);
    }

    #[test]
    fn reloads_only_after_the_file_changes() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("scene.toml");
        fs::write(&path, ONE_CHUNK).unwrap();

        let mut watcher = SceneWatcher::new(Some(path.clone())).with_poll_interval(Duration::ZERO);
        let mut plugins = PluginSet::new();
        let start = Instant::now();
        assert!(!watcher.poll(start, &mut plugins));
        assert!(plugins.is_empty());

        bump_mtime(&path, TWO_CHUNKS, 10);
        assert!(watcher.poll(start, &mut plugins));
        assert_eq!(plugins.len(), 2);
        assert!(plugins.is_dirty());

        assert!(!watcher.poll(start, &mut plugins));
    }

    #[test]
    fn invalid_reload_keeps_current_plugins() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("scene.toml");
        fs::write(&path, ONE_CHUNK).unwrap();

        let mut watcher = SceneWatcher::new(Some(path.clone())).with_poll_interval(Duration::ZERO);
        let scene = sceneconfig::SceneConfig::from_toml_str(ONE_CHUNK).unwrap();
        let mut plugins = crate::plugins::plugin_set_from_scene(&scene);

        bump_mtime(&path, "version = 9\n", 10);
        assert!(!watcher.poll(Instant::now(), &mut plugins));
        assert_eq!(plugins.len(), 1);
    }

    #[test]
    fn polling_is_throttled() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("scene.toml");
        fs::write(&path, ONE_CHUNK).unwrap();

        let mut watcher = SceneWatcher::new(Some(path.clone()));
        let mut plugins = PluginSet::new();
        let start = Instant::now();
        assert!(!watcher.poll(start, &mut plugins));

        bump_mtime(&path, TWO_CHUNKS, 10);
        assert!(!watcher.poll(start + Duration::from_millis(100), &mut plugins));
        assert!(watcher.poll(start + POLL_INTERVAL, &mut plugins));
    }
}
