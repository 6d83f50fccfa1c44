use chunks::ChunkPlugin;

/// Stable handle for a plugin inside a [`PluginSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(u64);

struct PluginEntry {
    id: PluginId,
    enabled: bool,
    plugin: Box<dyn ChunkPlugin>,
}

/// Ordered plugin instances feeding one render loop, plus its dirty flag.
///
/// Every structural change (insert, remove, replace, enable toggle or an
/// explicit [`PluginSet::mark_changed`]) sets the flag. Uniform writes never
/// do. The render loop clears it after each recomposition attempt.
pub struct PluginSet {
    entries: Vec<PluginEntry>,
    next_id: u64,
    dirty: bool,
}

impl Default for PluginSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSet")
            .field(
                "entries",
                &self
                    .entries
                    .iter()
                    .map(|entry| (entry.id, entry.plugin.kind(), entry.enabled))
                    .collect::<Vec<_>>(),
            )
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl PluginSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            dirty: false,
        }
    }

    pub fn from_plugins(plugins: impl IntoIterator<Item = Box<dyn ChunkPlugin>>) -> Self {
        let mut set = Self::new();
        for plugin in plugins {
            set.push(plugin);
        }
        set
    }

    fn allocate(&mut self) -> PluginId {
        let id = PluginId(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: PluginId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Appends an enabled plugin.
    pub fn push(&mut self, plugin: Box<dyn ChunkPlugin>) -> PluginId {
        let index = self.entries.len();
        self.insert(index, plugin)
    }

    /// Inserts an enabled plugin at `index`, clamped to the current length.
    pub fn insert(&mut self, index: usize, plugin: Box<dyn ChunkPlugin>) -> PluginId {
        let id = self.allocate();
        let index = index.min(self.entries.len());
        tracing::debug!(kind = plugin.kind(), index, "plugin inserted");
        self.entries.insert(
            index,
            PluginEntry {
                id,
                enabled: true,
                plugin,
            },
        );
        self.dirty = true;
        id
    }

    pub fn remove(&mut self, id: PluginId) -> Option<Box<dyn ChunkPlugin>> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        tracing::debug!(kind = entry.plugin.kind(), index, "plugin removed");
        self.dirty = true;
        Some(entry.plugin)
    }

    /// Swaps the plugin behind `id`, keeping its position and enabled state.
    pub fn replace(&mut self, id: PluginId, plugin: Box<dyn ChunkPlugin>) -> Option<Box<dyn ChunkPlugin>> {
        let index = self.position(id)?;
        let previous = std::mem::replace(&mut self.entries[index].plugin, plugin);
        self.dirty = true;
        Some(previous)
    }

    /// Replaces the whole set, e.g. after a scene reload.
    pub fn replace_all(&mut self, plugins: impl IntoIterator<Item = Box<dyn ChunkPlugin>>) {
        self.entries.clear();
        for plugin in plugins {
            self.push(plugin);
        }
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Enables or disables a plugin. Only an actual change marks the set dirty.
    pub fn set_enabled(&mut self, id: PluginId, enabled: bool) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if entry.enabled != enabled {
            entry.enabled = enabled;
            self.dirty = true;
        }
        true
    }

    /// Flips the plugin at `index`, returning its new state.
    pub fn toggle_at(&mut self, index: usize) -> Option<bool> {
        let entry = self.entries.get_mut(index)?;
        entry.enabled = !entry.enabled;
        tracing::info!(
            kind = entry.plugin.kind(),
            index,
            enabled = entry.enabled,
            "plugin toggled"
        );
        self.dirty = true;
        Some(entry.enabled)
    }

    pub fn toggle(&mut self, id: PluginId) -> Option<bool> {
        let index = self.position(id)?;
        self.toggle_at(index)
    }

    /// Signals that a plugin reconfigured its chunks in place.
    pub fn mark_changed(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled plugins in order.
    pub fn active(&self) -> impl Iterator<Item = &(dyn ChunkPlugin + 'static)> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.plugin.as_ref())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut (dyn ChunkPlugin + 'static)> + '_ {
        self.entries
            .iter_mut()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.plugin.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl ChunkPlugin for Named {
        fn kind(&self) -> &str {
            self.0
        }
    }

    fn kinds(set: &PluginSet) -> Vec<&str> {
        set.active().map(|plugin| plugin.kind()).collect()
    }

    #[test]
    fn structural_changes_mark_dirty() {
        let mut set = PluginSet::new();
        assert!(!set.is_dirty());

        let a = set.push(Box::new(Named("a")));
        assert!(set.is_dirty());
        set.clear_dirty();

        set.insert(0, Box::new(Named("b")));
        assert!(set.is_dirty());
        assert_eq!(kinds(&set), vec!["b", "a"]);
        set.clear_dirty();

        set.replace(a, Box::new(Named("c")));
        assert!(set.is_dirty());
        assert_eq!(kinds(&set), vec!["b", "c"]);
        set.clear_dirty();

        assert!(set.remove(a).is_some());
        assert!(set.is_dirty());
        assert!(set.remove(a).is_none());
    }

    #[test]
    fn toggling_hides_plugins_from_active() {
        let mut set = PluginSet::new();
        let a = set.push(Box::new(Named("a")));
        set.push(Box::new(Named("b")));
        set.clear_dirty();

        assert_eq!(set.toggle(a), Some(false));
        assert!(set.is_dirty());
        assert_eq!(kinds(&set), vec!["b"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn redundant_enable_is_not_a_change() {
        let mut set = PluginSet::new();
        let a = set.push(Box::new(Named("a")));
        set.clear_dirty();
        assert!(set.set_enabled(a, true));
        assert!(!set.is_dirty());
        assert!(set.set_enabled(a, false));
        assert!(set.is_dirty());
    }

    #[test]
    fn replace_all_resets_order() {
        let mut set = PluginSet::from_plugins([
            Box::new(Named("a")) as Box<dyn ChunkPlugin>,
            Box::new(Named("b")),
        ]);
        set.clear_dirty();
        set.replace_all([Box::new(Named("z")) as Box<dyn ChunkPlugin>]);
        assert!(set.is_dirty());
        assert_eq!(kinds(&set), vec!["z"]);
    }
}
