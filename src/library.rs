//! The library handle.
//!
//! A [`Library`] owns one catalog store, one scanner, one reconciler and one
//! change queue for a single library root. Nothing is process-global: open
//! as many handles on as many roots as needed.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{
    Config, IntrospectionBackend, IntrospectionConfig, RegistryBackend, RegistryConfig,
    ScannerConfig,
};
use crate::db::{
    ActivationState, Database, FacetColumn, FacetSyncReport, FamilyEntry, LibraryStats,
    ScanRecord, Source,
};
use crate::error::StoreResult;
use crate::facets::FacetSchema;
use crate::introspect::{FaceIntrospector, RpcIntrospector};
use crate::reconcile::{Reconciler, SweepReport};
use crate::registry::{FontRegistry, MemoryRegistry, UserFontDirRegistry};
use crate::scanner::{PathScan, ScanResult, Scanner};
use crate::watcher::{ChangeQueue, DrainStats};

/// Name of the store file inside a library root.
pub const STORE_FILE: &str = "fontshelf.db";

#[derive(Debug, Clone)]
pub struct LibraryOptions {
    pub scanner: ScannerConfig,
    pub debounce: Duration,
}

impl LibraryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scanner: config.scanner.clone(),
            debounce: Duration::from_millis(config.watcher.debounce_ms),
        }
    }
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What handling one changed path did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The path is a source root and the whole source was rescanned.
    SourceRescanned(ScanResult),
    /// A directory inside a source was scanned.
    SubtreeScanned(ScanResult),
    File(PathScan),
    /// The path is gone. Lists every file marked missing because of it.
    Missing(Vec<PathBuf>),
    /// A directory outside every enabled source.
    Ignored,
}

pub struct Library {
    root: PathBuf,
    db: Database,
    scanner: Scanner,
    reconciler: Reconciler,
    changes: Arc<ChangeQueue>,
}

impl Library {
    /// Open the library at `root` with the collaborators named by `config`.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        let introspector = build_introspector(&config.introspection)?;
        let registry = build_registry(&config.registry)?;
        Self::open_with(root, introspector, registry, LibraryOptions::from_config(config))
    }

    pub fn open_with(
        root: &Path,
        introspector: Arc<dyn FaceIntrospector>,
        registry: Arc<dyn FontRegistry>,
        options: LibraryOptions,
    ) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create library root {}", root.display()))?;
        let store_path = root.join(STORE_FILE);
        let db = Database::open(&store_path)
            .with_context(|| format!("Failed to open store {}", store_path.display()))?;
        db.initialize().context("Failed to apply store schema")?;

        let scanner = Scanner::new(introspector, &options.scanner)?;
        info!("Opened library at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            db,
            scanner,
            reconciler: Reconciler::new(registry),
            changes: Arc::new(ChangeQueue::new(options.debounce)),
        })
    }

    pub fn close(self) -> Result<()> {
        let root = self.root;
        self.db
            .close()
            .with_context(|| format!("Failed to close store in {}", root.display()))?;
        info!("Closed library at {}", root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn change_queue(&self) -> Arc<ChangeQueue> {
        Arc::clone(&self.changes)
    }

    // ========================================================================
    // Sources
    // ========================================================================

    pub fn list_sources(&self) -> StoreResult<Vec<Source>> {
        self.db.list_sources()
    }

    /// Roots the watcher should cover.
    pub fn enabled_source_roots(&self) -> StoreResult<Vec<PathBuf>> {
        Ok(self
            .db
            .list_sources()?
            .into_iter()
            .filter(|s| s.enabled)
            .map(|s| s.path)
            .collect())
    }

    /// Add (or re-enable) a source directory and scan it.
    pub fn add_source(&self, path: &Path) -> Result<(Source, ScanResult)> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Cannot resolve source {}", path.display()))?;
        if !path.is_dir() {
            bail!("Source {} is not a directory", path.display());
        }

        let source = self.db.add_source(&path)?;
        info!("Added source {}", source.path.display());
        let result = self.scan_source(&source)?;
        Ok((source, result))
    }

    /// Disable a source. Its files stay in the catalog as they are.
    pub fn remove_source(&self, path: &Path) -> Result<bool> {
        let path = resolve(path);
        let removed = self.db.disable_source(&path)?;
        if removed {
            info!("Disabled source {}", path.display());
        }
        Ok(removed)
    }

    pub fn rescan_source(&self, path: &Path) -> Result<ScanResult> {
        let path = resolve(path);
        let Some(source) = self.db.get_source(&path)? else {
            bail!("{} is not a source", path.display());
        };
        if !source.enabled {
            bail!("Source {} is disabled", path.display());
        }
        Ok(self.scan_source(&source)?)
    }

    /// Rescan every enabled source.
    pub fn rescan_all(&self) -> StoreResult<ScanResult> {
        let mut total = ScanResult::default();
        for source in self.db.list_sources()?.into_iter().filter(|s| s.enabled) {
            total.merge(self.scan_source(&source)?);
        }
        Ok(total)
    }

    /// Startup pass over every enabled source: mark vanished files missing
    /// and scan new or changed ones. Unchanged files keep their activation.
    pub fn catch_up_sources(&self) -> StoreResult<ScanResult> {
        let mut total = ScanResult::default();
        for source in self.db.list_sources()?.into_iter().filter(|s| s.enabled) {
            let result = self.scanner.catch_up(&self.db, &source)?;
            self.unregister_all(result.missing_paths.iter().chain(&result.deactivated_paths));
            total.merge(result);
        }
        Ok(total)
    }

    fn scan_source(&self, source: &Source) -> StoreResult<ScanResult> {
        let result = self.scanner.scan_directory(&self.db, source)?;
        self.unregister_all(result.missing_paths.iter().chain(&result.deactivated_paths));
        Ok(result)
    }

    pub fn recent_scans(&self, limit: usize) -> StoreResult<Vec<ScanRecord>> {
        self.db.recent_scans(limit)
    }

    // ========================================================================
    // Families, activation and facets
    // ========================================================================

    pub fn list_families(&self) -> StoreResult<Vec<FamilyEntry>> {
        self.db.list_families()
    }

    pub fn set_family_facet_values(
        &self,
        family_id: i64,
        column_key: &str,
        value_keys: &[String],
    ) -> StoreResult<()> {
        self.db
            .set_family_facet_values(family_id, column_key, value_keys)
    }

    /// Returns the activation flag actually stored for the face.
    pub fn set_face_activated(&self, face_id: i64, desired: bool) -> StoreResult<bool> {
        self.reconciler.set_face_activated(&self.db, face_id, desired)
    }

    pub fn face_state(&self, face_id: i64) -> StoreResult<ActivationState> {
        self.db.face_state(face_id)
    }

    pub fn list_facet_columns(&self) -> StoreResult<Vec<FacetColumn>> {
        self.db.list_facet_columns()
    }

    pub fn sync_facet_schema(&self, schema: &FacetSchema) -> StoreResult<FacetSyncReport> {
        let report = self.db.sync_facet_schema(schema)?;
        if !report.is_noop() {
            info!("Facet schema synced: {:?}", report);
        }
        Ok(report)
    }

    pub fn sync_facet_schema_file(&self, path: &Path) -> Result<FacetSyncReport> {
        let schema = FacetSchema::load(path)
            .with_context(|| format!("Failed to load facet schema {}", path.display()))?;
        Ok(self.sync_facet_schema(&schema)?)
    }

    pub fn reconcile_activation_state(&self) -> StoreResult<SweepReport> {
        self.reconciler.sweep(&self.db)
    }

    pub fn library_stats(&self) -> StoreResult<LibraryStats> {
        self.db.stats()
    }

    // ========================================================================
    // Change feed
    // ========================================================================

    pub fn notify_changed<I>(&self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.changes.push_batch(paths);
    }

    /// Process queued changes. `None` means another drain is already running
    /// and will pick up anything queued meanwhile.
    pub fn drain_changes(&self, force: bool) -> StoreResult<Option<DrainStats>> {
        self.changes
            .drain(force, |path| self.handle_changed_path(path).map(|_| ()))
    }

    /// Re-stat a changed path and route it to the right scan or to missing
    /// handling.
    pub fn handle_changed_path(&self, path: &Path) -> StoreResult<ChangeOutcome> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(ChangeOutcome::Missing(self.handle_missing_path(path)?)),
        };

        if metadata.is_dir() {
            if let Some(source) = self.db.get_source(path)?.filter(|s| s.enabled) {
                return Ok(ChangeOutcome::SourceRescanned(self.scan_source(&source)?));
            }
            let Some(source) = self.db.find_source_for_path(path)? else {
                debug!("Ignoring change outside sources: {}", path.display());
                return Ok(ChangeOutcome::Ignored);
            };
            let result = self.scanner.scan_subtree(&self.db, &source, path)?;
            self.unregister_all(result.missing_paths.iter().chain(&result.deactivated_paths));
            return Ok(ChangeOutcome::SubtreeScanned(result));
        }

        let outcome = self.scanner.scan_path(&self.db, path)?;
        match &outcome {
            PathScan::Scanned {
                cleared_activation: true,
                ..
            }
            | PathScan::Failed {
                cleared_activation: true,
                ..
            }
            | PathScan::Missing { existed: true } => {
                self.reconciler.unregister_quietly(path);
            }
            _ => {}
        }
        Ok(ChangeOutcome::File(outcome))
    }

    /// Mark a vanished path missing. An unknown path is treated as a removed
    /// directory. Every affected file gets a best-effort unregister. Paths
    /// outside enabled sources are left alone.
    pub fn handle_missing_path(&self, path: &Path) -> StoreResult<Vec<PathBuf>> {
        if self.db.find_source_for_path(path)?.is_none() {
            debug!("Ignoring removal outside enabled sources: {}", path.display());
            return Ok(Vec::new());
        }
        let missing = if self.db.mark_file_missing(path)? {
            vec![path.to_path_buf()]
        } else {
            self.db.mark_missing_under_path(path)?
        };
        if !missing.is_empty() {
            info!("{} file(s) missing under {}", missing.len(), path.display());
        }
        self.unregister_all(&missing);
        Ok(missing)
    }

    fn unregister_all<'a, I>(&self, paths: I)
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in paths {
            self.reconciler.unregister_quietly(path);
        }
    }
}

/// Canonical form of `path` when it still exists, else `path` itself.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn build_introspector(config: &IntrospectionConfig) -> Result<Arc<dyn FaceIntrospector>> {
    match config.backend {
        IntrospectionBackend::Native => native_introspector(),
        IntrospectionBackend::Rpc => {
            if config.command.is_empty() {
                bail!("introspection.command must be set for the rpc backend");
            }
            let introspector =
                RpcIntrospector::spawn(&config.command, Duration::from_secs(config.timeout_secs))
                    .with_context(|| {
                        format!("Failed to start introspection helper {:?}", config.command)
                    })?;
            Ok(Arc::new(introspector))
        }
    }
}

#[cfg(feature = "native")]
fn native_introspector() -> Result<Arc<dyn FaceIntrospector>> {
    Ok(Arc::new(crate::introspect::NativeIntrospector::new()))
}

#[cfg(not(feature = "native"))]
fn native_introspector() -> Result<Arc<dyn FaceIntrospector>> {
    bail!("built without the `native` feature; set introspection.backend = \"rpc\"")
}

fn build_registry(config: &RegistryConfig) -> Result<Arc<dyn FontRegistry>> {
    match config.backend {
        RegistryBackend::Memory => Ok(Arc::new(MemoryRegistry::new())),
        RegistryBackend::UserDir => {
            let registry = match &config.font_dir {
                Some(dir) => UserFontDirRegistry::new(dir),
                None => UserFontDirRegistry::default_location()?,
            };
            debug!("Registering fonts in {}", registry.font_dir().display());
            Ok(Arc::new(registry))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FileStatus;
    use crate::test_support::FixedIntrospector;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _root: TempDir,
        fonts: TempDir,
        introspector: Arc<FixedIntrospector>,
        registry: Arc<MemoryRegistry>,
        library: Library,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let fonts = tempdir().unwrap();
            let introspector = Arc::new(
                FixedIntrospector::new()
                    .with("A.ttf", &[(0, "Alpha", "Regular"), (1, "Alpha", "Bold")])
                    .with("B.otf", &[(0, "Beta", "Regular")]),
            );
            let registry = Arc::new(MemoryRegistry::new());
            let options = LibraryOptions {
                scanner: ScannerConfig {
                    workers: 2,
                    follow_symlinks: false,
                },
                debounce: Duration::from_millis(0),
            };
            let library =
                Library::open_with(root.path(), introspector.clone(), registry.clone(), options)
                    .unwrap();
            Self {
                _root: root,
                fonts,
                introspector,
                registry,
                library,
            }
        }

        fn font(&self, name: &str) -> PathBuf {
            self.fonts.path().canonicalize().unwrap().join(name)
        }

        fn write(&self, name: &str) -> PathBuf {
            let path = self.font(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, name.as_bytes()).unwrap();
            path
        }

        fn face_ids(&self, file: &Path) -> Vec<i64> {
            self.library
                .list_families()
                .unwrap()
                .into_iter()
                .flat_map(|f| f.faces)
                .filter(|face| face.path == file)
                .map(|face| face.id)
                .collect()
        }
    }

    #[test]
    fn test_add_source_and_activate_faces() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.write("B.otf");

        let (source, result) = fx.library.add_source(fx.fonts.path()).unwrap();
        assert!(source.enabled);
        assert_eq!(result.scanned, 2);

        let families = fx.library.list_families().unwrap();
        assert_eq!(families.len(), 2);
        let faces: Vec<_> = families.iter().flat_map(|f| &f.faces).collect();
        assert_eq!(faces.len(), 3);
        assert!(faces.iter().all(|f| !f.activated && f.install_supported));

        let ids = fx.face_ids(&a);
        assert!(fx.library.set_face_activated(ids[0], true).unwrap());
        assert_eq!(fx.registry.register_calls(), 1);
        assert!(fx.library.set_face_activated(ids[1], true).unwrap());
        assert_eq!(fx.registry.register_calls(), 1);

        assert!(!fx.library.set_face_activated(ids[1], false).unwrap());
        assert_eq!(fx.registry.unregister_calls(), 0);
        assert!(!fx.library.set_face_activated(ids[0], false).unwrap());
        assert_eq!(fx.registry.unregister_calls(), 1);
        assert!(fx.registry.registered().is_empty());
    }

    #[test]
    fn test_deleted_file_is_marked_missing_and_unregistered() {
        let fx = Fixture::new();
        fx.write("A.ttf");
        let b = fx.write("B.otf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        let id = fx.face_ids(&b)[0];
        fx.library.set_face_activated(id, true).unwrap();
        assert_eq!(fx.registry.registered(), vec![b.clone()]);

        fs::remove_file(&b).unwrap();
        let missing = fx.library.handle_missing_path(&b).unwrap();
        assert_eq!(missing, vec![b.clone()]);
        assert_eq!(fx.library.face_state(id).unwrap(), ActivationState::NotInstallable);
        assert!(fx.registry.registered().is_empty());
        assert_eq!(fx.registry.unregister_calls(), 1);
    }

    #[test]
    fn test_deleted_file_reported_by_change_feed() {
        let fx = Fixture::new();
        fx.write("A.ttf");
        let b = fx.write("B.otf");
        fx.library.add_source(fx.fonts.path()).unwrap();
        let id = fx.face_ids(&b)[0];
        fx.library.set_face_activated(id, true).unwrap();

        fs::remove_file(&b).unwrap();
        fx.library.notify_changed(vec![b.clone()]);
        let stats = fx.library.drain_changes(true).unwrap().unwrap();

        assert_eq!(stats.processed, 1);
        let file = fx.library.database().get_file(&b).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Missing);
        assert_eq!(fx.library.face_state(id).unwrap(), ActivationState::NotInstallable);
        assert!(fx.registry.registered().is_empty());
        assert_eq!(fx.library.change_queue().pending_len(), 0);
    }

    #[test]
    fn test_removal_under_disabled_source_is_ignored() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();
        fx.library.remove_source(fx.fonts.path()).unwrap();

        fs::remove_file(&a).unwrap();
        assert!(fx.library.handle_missing_path(&a).unwrap().is_empty());
        assert!(fx.library.handle_missing_path(fx.fonts.path()).unwrap().is_empty());

        let file = fx.library.database().get_file(&a).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Ok);
    }

    #[test]
    fn test_restart_catch_up_keeps_activation() {
        let Fixture {
            _root: root,
            fonts,
            introspector,
            registry,
            library,
        } = Fixture::new();
        let dir = fonts.path().canonicalize().unwrap();
        let a = dir.join("A.ttf");
        let b = dir.join("B.otf");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        library.add_source(&dir).unwrap();
        let active = library
            .list_families()
            .unwrap()
            .into_iter()
            .flat_map(|f| f.faces)
            .find(|face| face.path == a)
            .unwrap()
            .id;
        library.set_face_activated(active, true).unwrap();
        library.close().unwrap();

        // While the process is down: one file goes away, one arrives
        fs::remove_file(&b).unwrap();
        introspector.set("C.ttf", &[(0, "Gamma", "Regular")]);
        let c = dir.join("C.ttf");
        fs::write(&c, b"c").unwrap();

        let options = LibraryOptions {
            scanner: ScannerConfig {
                workers: 2,
                follow_symlinks: false,
            },
            debounce: Duration::from_millis(0),
        };
        let library =
            Library::open_with(root.path(), introspector.clone(), registry.clone(), options)
                .unwrap();
        let result = library.catch_up_sources().unwrap();
        let report = library.reconcile_activation_state().unwrap();

        assert_eq!(result.missing_paths, vec![b.clone()]);
        assert_eq!(result.scanned, 1);
        assert_eq!(report.registered + report.unregistered, 0);
        assert_eq!(library.face_state(active).unwrap(), ActivationState::Active);
        assert_eq!(registry.registered(), vec![a]);
        assert_eq!(
            library.database().get_file(&b).unwrap().unwrap().status,
            FileStatus::Missing
        );
        assert_eq!(
            library.database().get_file(&c).unwrap().unwrap().status,
            FileStatus::Ok
        );
    }

    #[test]
    fn test_removed_directory_marks_every_file_missing() {
        let fx = Fixture::new();
        fx.write("A.ttf");
        let nested_a = fx.write("set/A.ttf");
        let nested_b = fx.write("set/B.otf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        let set = fx.font("set");
        fs::remove_dir_all(&set).unwrap();
        fx.library.notify_changed(vec![set]);
        let stats = fx.library.drain_changes(true).unwrap().unwrap();
        assert_eq!(stats.processed, 1);

        for path in [&nested_a, &nested_b] {
            let file = fx.library.database().get_file(path).unwrap().unwrap();
            assert_eq!(file.status, FileStatus::Missing);
        }
        let top = fx.library.database().get_file(&fx.font("A.ttf")).unwrap().unwrap();
        assert_eq!(top.status, FileStatus::Ok);
    }

    #[test]
    fn test_change_feed_scans_new_files_and_subtrees() {
        let fx = Fixture::new();
        fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        let b = fx.write("B.otf");
        fx.introspector.set("C.ttc", &[(0, "Gamma", "Regular"), (1, "Gamma", "Italic")]);
        let c = fx.write("extra/C.ttc");
        fx.write("notes.txt");

        assert!(matches!(
            fx.library.handle_changed_path(&fx.font("notes.txt")).unwrap(),
            ChangeOutcome::File(PathScan::Skipped(_))
        ));

        fx.library
            .notify_changed(vec![b.clone(), fx.font("extra"), b.clone()]);
        let stats = fx.library.drain_changes(true).unwrap().unwrap();
        assert_eq!(stats.processed, 2);

        assert!(fx.library.database().get_file(&b).unwrap().is_some());
        assert!(fx.library.database().get_file(&c).unwrap().is_some());
        assert_eq!(fx.library.library_stats().unwrap().faces, 5);
    }

    #[test]
    fn test_rescan_after_content_change_unregisters() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();
        let id = fx.face_ids(&a)[0];
        fx.library.set_face_activated(id, true).unwrap();

        fx.introspector.set("A.ttf", &[(0, "Alpha", "Regular")]);
        let outcome = fx.library.handle_changed_path(&a).unwrap();
        assert_eq!(
            outcome,
            ChangeOutcome::File(PathScan::Scanned {
                faces: 1,
                cleared_activation: true
            })
        );
        assert!(fx.registry.registered().is_empty());
    }

    #[test]
    fn test_broken_file_is_kept_as_error() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        fx.introspector.forget("A.ttf");
        let result = fx.library.rescan_source(fx.fonts.path()).unwrap();
        assert_eq!(result.failed, 1);
        let file = fx.library.database().get_file(&a).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert!(file.error_message.is_some());
    }

    #[test]
    fn test_remove_source_orphans_files() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        assert!(fx.library.remove_source(fx.fonts.path()).unwrap());
        assert!(fx.library.enabled_source_roots().unwrap().is_empty());
        assert!(fx.library.rescan_source(fx.fonts.path()).is_err());

        // Files outside enabled sources are ignored by the change feed
        assert!(matches!(
            fx.library.handle_changed_path(&a).unwrap(),
            ChangeOutcome::File(PathScan::Skipped(_))
        ));
        assert_eq!(fx.library.list_families().unwrap().len(), 1);

        // Re-adding re-enables the same source
        let (source, _) = fx.library.add_source(fx.fonts.path()).unwrap();
        assert!(source.enabled);
        assert_eq!(fx.library.list_sources().unwrap().len(), 1);
    }

    #[test]
    fn test_reconcile_repairs_external_removal() {
        let fx = Fixture::new();
        let a = fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();
        fx.library
            .set_face_activated(fx.face_ids(&a)[0], true)
            .unwrap();

        fx.registry.force_state(&a, false);
        let report = fx.library.reconcile_activation_state().unwrap();
        assert_eq!(report.registered, 1);
        assert_eq!(fx.registry.registered(), vec![a]);
    }

    #[test]
    fn test_facets_through_the_handle() {
        let fx = Fixture::new();
        fx.write("A.ttf");
        fx.library.add_source(fx.fonts.path()).unwrap();

        let schema_path = fx.fonts.path().join("facets.toml");
        fs::write(
            &schema_path,
            "[[columns]]\nkey = \"mood\"\ntype = \"multi_select\"\nvalues = [\"calm\", \"loud\"]\n",
        )
        .unwrap();
        let report = fx.library.sync_facet_schema_file(&schema_path).unwrap();
        assert_eq!(report.columns_added, 1);
        assert!(fx
            .library
            .sync_facet_schema_file(&schema_path)
            .unwrap()
            .is_noop());

        let family_id = fx.library.list_families().unwrap()[0].id;
        fx.library
            .set_family_facet_values(family_id, "mood", &["calm".to_string(), "loud".to_string()])
            .unwrap();
        assert_eq!(fx.library.list_families().unwrap()[0].facets.len(), 2);
    }

    #[test]
    fn test_two_libraries_coexist() {
        let first = Fixture::new();
        let second = Fixture::new();
        first.write("A.ttf");
        first.library.add_source(first.fonts.path()).unwrap();

        assert_eq!(first.library.library_stats().unwrap().files_ok, 1);
        assert_eq!(second.library.library_stats().unwrap().files_ok, 0);

        let root = first.library.root().to_path_buf();
        first.library.close().unwrap();
        assert!(root.join(STORE_FILE).exists());
    }
}
