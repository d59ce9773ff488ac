//! On-disk workspace of units, modules, reports and learner interactions.
//!
//! Directory layout:
//!
//! ```text
//! workspace/
//! ├── units/
//! │   ├── 5.json                  # current version
//! │   └── history/
//! │       └── 5-v1.json           # earlier versions
//! ├── modules/
//! │   └── module-5.json
//! ├── reports/
//! │   └── 5/
//! │       └── qr_0001.json
//! └── interactions/
//!     ├── 5.json                  # InteractionLog
//!     └── 5.progress.csv          # optional extra progress rows
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{QaError, Result};
use crate::feedback::{read_progress_csv, InteractionLog, LearnerProgress};
use crate::model::{
    CurriculumUnit, ImportReceipt, Module, ModuleId, PublicationStatus, QualityReport, UnitId,
};

use super::persistence::{list_dirs, list_json_files, load_json, save_json};

const UNITS_DIR: &str = "units";
const HISTORY_DIR: &str = "history";
const MODULES_DIR: &str = "modules";
const REPORTS_DIR: &str = "reports";
const INTERACTIONS_DIR: &str = "interactions";
const PROGRESS_SUFFIX: &str = ".progress.csv";

/// All curriculum state the local collaborators work on.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    units: BTreeMap<UnitId, CurriculumUnit>,
    history: BTreeMap<UnitId, Vec<CurriculumUnit>>,
    modules: BTreeMap<ModuleId, Module>,
    reports: BTreeMap<UnitId, Vec<QualityReport>>,
    interactions: BTreeMap<UnitId, InteractionLog>,
    csv_progress: BTreeMap<UnitId, Vec<LearnerProgress>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a workspace from a directory. Missing subdirectories are empty.
    pub fn load_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(QaError::NotFound(format!(
                "workspace directory '{}'",
                root.display()
            )));
        }

        let mut ws = Self::new();

        for path in list_json_files(&root.join(UNITS_DIR))? {
            let unit: CurriculumUnit = load_json(&path)?;
            ws.units.insert(unit.id.clone(), unit);
        }

        for path in list_json_files(&root.join(UNITS_DIR).join(HISTORY_DIR))? {
            let unit: CurriculumUnit = load_json(&path)?;
            ws.history.entry(unit.id.clone()).or_default().push(unit);
        }
        for versions in ws.history.values_mut() {
            versions.sort_by_key(|u| u.version);
        }

        for path in list_json_files(&root.join(MODULES_DIR))? {
            let module: Module = load_json(&path)?;
            ws.modules.insert(module.id.clone(), module);
        }

        for dir in list_dirs(&root.join(REPORTS_DIR))? {
            for path in list_json_files(&dir)? {
                let report: QualityReport = load_json(&path)?;
                ws.reports.entry(report.unit_id.clone()).or_default().push(report);
            }
        }
        for reports in ws.reports.values_mut() {
            reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        }

        ws.load_interactions(&root.join(INTERACTIONS_DIR))?;

        info!(
            units = ws.units.len(),
            modules = ws.modules.len(),
            "Loaded workspace from {}",
            root.display()
        );
        Ok(ws)
    }

    fn load_interactions(&mut self, dir: &Path) -> Result<()> {
        for path in list_json_files(dir)? {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            let log = InteractionLog::load_json(&path)?;
            self.interactions
                .entry(UnitId::new(stem))
                .or_default()
                .merge(log);
        }

        if !dir.exists() {
            return Ok(());
        }
        let entries = fs::read_dir(dir).map_err(|e| QaError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let mut csv_files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(PROGRESS_SUFFIX))
            })
            .collect();
        csv_files.sort();

        for path in csv_files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let unit_id = UnitId::new(name.trim_end_matches(PROGRESS_SUFFIX));
            let rows = read_progress_csv(&path)?;
            debug!(unit = %unit_id, rows = rows.len(), "Read progress CSV");
            self.csv_progress.entry(unit_id).or_default().extend(rows);
        }
        Ok(())
    }

    /// Write the workspace to a directory.
    ///
    /// Progress CSV files are read-only inputs and are never rewritten.
    pub fn save_dir(&self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();

        for unit in self.units.values() {
            save_json(unit, root.join(UNITS_DIR).join(format!("{}.json", unit.id)))?;
        }
        for versions in self.history.values() {
            for unit in versions {
                save_json(
                    unit,
                    root.join(UNITS_DIR)
                        .join(HISTORY_DIR)
                        .join(format!("{}-v{}.json", unit.id, unit.version)),
                )?;
            }
        }
        for module in self.modules.values() {
            save_json(module, root.join(MODULES_DIR).join(format!("{}.json", module.id)))?;
        }
        for (unit_id, reports) in &self.reports {
            for report in reports {
                save_json(
                    report,
                    root.join(REPORTS_DIR)
                        .join(unit_id.as_str())
                        .join(format!("{}.json", report.id)),
                )?;
            }
        }
        for (unit_id, log) in &self.interactions {
            if !log.is_empty() {
                save_json(log, root.join(INTERACTIONS_DIR).join(format!("{}.json", unit_id)))?;
            }
        }

        debug!("Saved workspace to {}", root.display());
        Ok(())
    }

    /// Add a unit, or store a new version of an existing one.
    ///
    /// The replaced version moves to the unit's history.
    pub fn upsert_unit(&mut self, unit: CurriculumUnit) -> Result<()> {
        check_unit_id(&unit.id)?;
        if let Some(previous) = self.units.get(&unit.id) {
            if unit.version <= previous.version {
                return Err(QaError::InvalidUnit(format!(
                    "unit {} version {} does not follow version {}",
                    unit.id, unit.version, previous.version
                )));
            }
        }
        if let Some(previous) = self.units.insert(unit.id.clone(), unit) {
            self.history
                .entry(previous.id.clone())
                .or_default()
                .push(previous);
        }
        Ok(())
    }

    pub fn unit(&self, id: &UnitId) -> Option<&CurriculumUnit> {
        self.units.get(id)
    }

    /// Current unit, or `NotFound`.
    pub fn require_unit(&self, id: &UnitId) -> Result<&CurriculumUnit> {
        self.unit(id)
            .ok_or_else(|| QaError::NotFound(format!("unit {}", id)))
    }

    /// All unit identifiers in curriculum order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.units.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Units that come before `id` in curriculum order.
    pub fn prior_units(&self, id: &UnitId) -> Vec<UnitId> {
        self.unit_ids().into_iter().filter(|u| u < id).collect()
    }

    /// Earlier versions of a unit, oldest first.
    pub fn history(&self, id: &UnitId) -> &[CurriculumUnit] {
        self.history.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn record_report(&mut self, report: QualityReport) {
        self.reports
            .entry(report.unit_id.clone())
            .or_default()
            .push(report);
    }

    /// Reports for a unit, oldest first.
    pub fn reports(&self, id: &UnitId) -> &[QualityReport] {
        self.reports.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn latest_report(&self, id: &UnitId) -> Option<&QualityReport> {
        self.reports(id).last()
    }

    /// Find a report by id.
    pub fn report(&self, unit_id: &UnitId, report_id: &str) -> Option<&QualityReport> {
        self.reports(unit_id).iter().find(|r| r.id == report_id)
    }

    /// Publish a module.
    ///
    /// Refuses modules whose authorizing score is below `threshold`. Any
    /// other published module for the same unit is demoted to draft, so a
    /// unit has at most one published module.
    pub fn publish(&mut self, mut module: Module, threshold: f64) -> Result<ImportReceipt> {
        if module.authorizing_score < threshold {
            return Err(QaError::BelowThreshold {
                module_id: module.id.to_string(),
                score: module.authorizing_score,
                threshold,
            });
        }

        for other in self.modules.values_mut() {
            if other.unit_id == module.unit_id
                && other.id != module.id
                && other.status == PublicationStatus::Published
            {
                other.status = PublicationStatus::Draft;
                info!(module = %other.id, "Demoted module to draft");
            }
        }

        module.revision = match self.modules.get(&module.id) {
            Some(existing) => existing.revision + 1,
            None => 1,
        };
        module.status = PublicationStatus::Published;
        module.published_at = Some(Utc::now());

        let receipt = ImportReceipt {
            module_id: module.id.clone(),
            status: module.status,
        };
        info!(
            module = %module.id,
            revision = module.revision,
            "Published module"
        );
        self.modules.insert(module.id.clone(), module);
        Ok(receipt)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// The published module for a unit, if any.
    pub fn published_module(&self, unit_id: &UnitId) -> Option<&Module> {
        self.modules
            .values()
            .find(|m| &m.unit_id == unit_id && m.status == PublicationStatus::Published)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Add interaction records for a unit's module.
    pub fn record_interactions(&mut self, unit_id: &UnitId, log: InteractionLog) {
        self.interactions
            .entry(unit_id.clone())
            .or_default()
            .merge(log);
    }

    /// Every interaction record for a unit, including progress CSV rows.
    pub fn interaction_log(&self, unit_id: &UnitId) -> InteractionLog {
        let mut log = self.interactions.get(unit_id).cloned().unwrap_or_default();
        if let Some(rows) = self.csv_progress.get(unit_id) {
            log.progress.extend(rows.iter().cloned());
        }
        log
    }
}

/// Unit ids become file names, so they must be plain path components.
fn check_unit_id(id: &UnitId) -> Result<()> {
    let s = id.as_str();
    if s.trim().is_empty() || s.contains(['/', '\\']) || s == "." || s == ".." {
        return Err(QaError::InvalidUnit(format!(
            "'{}' cannot be used as a unit identifier",
            s
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ModuleBuilder;
    use crate::model::{Grade, LessonItem, SubUnit};
    use tempfile::tempdir;

    fn unit(id: u32) -> CurriculumUnit {
        CurriculumUnit::new(id, format!("Week {}", id))
            .with_focus("verbs")
            .with_sub_unit(SubUnit::new("Day 1").with_item(LessonItem::new("Conjugate")))
    }

    fn module_for(ws: &mut Workspace, id: u32, score: f64) -> Module {
        let unit = unit(id);
        let report = QualityReport::new(unit.id.clone(), score).with_snapshot(&unit);
        ws.record_report(report.clone());
        ModuleBuilder::new().build(&unit, &report).unwrap()
    }

    #[test]
    fn test_upsert_moves_old_version_to_history() {
        let mut ws = Workspace::new();
        ws.upsert_unit(unit(5)).unwrap();

        let mut next = unit(5);
        next.version = 2;
        ws.upsert_unit(next).unwrap();

        assert_eq!(ws.unit(&UnitId::from(5u32)).unwrap().version, 2);
        assert_eq!(ws.history(&UnitId::from(5u32)).len(), 1);
        assert_eq!(ws.history(&UnitId::from(5u32))[0].version, 1);
    }

    #[test]
    fn test_upsert_rejects_stale_version() {
        let mut ws = Workspace::new();
        ws.upsert_unit(unit(5)).unwrap();
        assert!(ws.upsert_unit(unit(5)).is_err());
        assert!(ws.unit(&UnitId::from(5u32)).is_some());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let mut ws = Workspace::new();
        let err = ws.upsert_unit(CurriculumUnit::new("../etc", "bad")).unwrap_err();
        assert!(matches!(err, QaError::InvalidUnit(_)));
    }

    #[test]
    fn test_prior_units_in_curriculum_order() {
        let mut ws = Workspace::new();
        for id in [10, 2, 9, 1] {
            ws.upsert_unit(unit(id)).unwrap();
        }
        let prior = ws.prior_units(&UnitId::from(10u32));
        let ids: Vec<&str> = prior.iter().map(|u| u.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "9"]);
    }

    #[test]
    fn test_publish_refuses_low_score() {
        let mut ws = Workspace::new();
        let module = module_for(&mut ws, 6, 6.0);
        let err = ws.publish(module, 7.5).unwrap_err();
        assert!(matches!(err, QaError::BelowThreshold { .. }));
        assert!(ws.published_module(&UnitId::from(6u32)).is_none());
    }

    #[test]
    fn test_republish_bumps_revision() {
        let mut ws = Workspace::new();
        let first = module_for(&mut ws, 5, 8.2);
        let receipt = ws.publish(first, 7.5).unwrap();
        assert_eq!(receipt.status, PublicationStatus::Published);

        let second = module_for(&mut ws, 5, 9.0);
        ws.publish(second, 7.5).unwrap();

        let published = ws.published_module(&UnitId::from(5u32)).unwrap();
        assert_eq!(published.revision, 2);
        assert_eq!(published.authorizing_score, 9.0);
        assert_eq!(ws.modules().count(), 1);
    }

    #[test]
    fn test_publish_demotes_other_published_module() {
        let mut ws = Workspace::new();
        let mut legacy = module_for(&mut ws, 5, 8.0);
        legacy.id = ModuleId::new("legacy-5");
        ws.publish(legacy, 7.5).unwrap();

        let current = module_for(&mut ws, 5, 8.5);
        ws.publish(current, 7.5).unwrap();

        let legacy = ws.module(&ModuleId::new("legacy-5")).unwrap();
        assert_eq!(legacy.status, PublicationStatus::Draft);
        assert_eq!(
            ws.published_module(&UnitId::from(5u32)).unwrap().id.as_str(),
            "module-5"
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut ws = Workspace::new();
        ws.upsert_unit(unit(4)).unwrap();
        let mut v2 = unit(4);
        v2.version = 2;
        ws.upsert_unit(v2).unwrap();
        let module = module_for(&mut ws, 4, 8.0);
        ws.publish(module, 7.5).unwrap();
        ws.record_interactions(
            &UnitId::from(4u32),
            InteractionLog::new()
                .with_progress(LearnerProgress::new("s1").completed(20.0).with_grade(Grade::B)),
        );
        ws.save_dir(dir.path()).unwrap();

        assert!(dir.path().join("units/4.json").exists());
        assert!(dir.path().join("units/history/4-v1.json").exists());
        assert!(dir.path().join("modules/module-4.json").exists());

        let loaded = Workspace::load_dir(dir.path()).unwrap();
        assert_eq!(loaded.unit(&UnitId::from(4u32)).unwrap().version, 2);
        assert_eq!(loaded.history(&UnitId::from(4u32)).len(), 1);
        assert_eq!(loaded.reports(&UnitId::from(4u32)).len(), 1);
        assert!(loaded.published_module(&UnitId::from(4u32)).is_some());
        assert_eq!(loaded.interaction_log(&UnitId::from(4u32)).progress.len(), 1);
    }

    #[test]
    fn test_progress_csv_is_merged() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("interactions")).unwrap();
        std::fs::write(
            dir.path().join("interactions/7.progress.csv"),
            "learner_id,completed,grade,minutes_spent\ns1,true,A,30\ns2,false,,5\n",
        )
        .unwrap();

        let ws = Workspace::load_dir(dir.path()).unwrap();
        assert_eq!(ws.interaction_log(&UnitId::from(7u32)).progress.len(), 2);

        // Saving must not copy CSV rows into the JSON log.
        ws.save_dir(dir.path()).unwrap();
        let reloaded = Workspace::load_dir(dir.path()).unwrap();
        assert_eq!(reloaded.interaction_log(&UnitId::from(7u32)).progress.len(), 2);
    }

    #[test]
    fn test_load_missing_directory() {
        let err = Workspace::load_dir("/definitely/not/a/workspace").unwrap_err();
        assert!(matches!(err, QaError::NotFound(_)));
    }
}
