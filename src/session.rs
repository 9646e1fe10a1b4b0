use std::path::Path;

use rand::rngs::StdRng;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::console::ConsoleLog;
use crate::dataset;
use crate::draw::{AxisMode, CardResult, DrawEngine, DualDraw, Placeholders};
use crate::error::{FetchError, ImportError, SelectionError};
use crate::import;
use crate::merge::MergeReport;
use crate::model::{Axis, GroupModel};
use crate::selection::{NodePath, SelectionState};

/// Keys that activate a focused card.
pub const ACTIVATION_KEYS: [&str; 2] = ["Enter", " "];

pub fn is_activation_key(key: &str) -> bool {
    ACTIVATION_KEYS.contains(&key)
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(MergeReport),
    /// The load failed after data was already present; the previous model is still in place.
    KeptPrevious(FetchError),
}

/// Owns the live group model, the checkbox state of both axes, the only-mode switches and the
/// card faces. Every operation runs to completion before the next one starts.
pub struct Session<R = StdRng> {
    model: GroupModel,
    selection: SelectionState,
    mode: AxisMode,
    card: CardResult,
    engine: DrawEngine<R>,
    log: ConsoleLog,
    last_import_digest: Option<String>,
}

impl Session<StdRng> {
    pub fn new(placeholders: Placeholders, seed: Option<u64>, log: ConsoleLog) -> Self {
        let engine = match seed {
            Some(seed) => DrawEngine::seeded(seed, placeholders),
            None => DrawEngine::from_entropy(placeholders),
        };
        Self::with_engine(engine, log)
    }
}

impl<R: Rng> Session<R> {
    pub fn with_engine(engine: DrawEngine<R>, log: ConsoleLog) -> Self {
        Self {
            model: GroupModel::new(),
            selection: SelectionState::new(),
            mode: AxisMode::default(),
            card: CardResult::placeholders(engine.placeholders()),
            engine,
            log,
            last_import_digest: None,
        }
    }

    pub fn model(&self) -> &GroupModel {
        &self.model
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn mode(&self) -> AxisMode {
        self.mode
    }

    pub fn card(&self) -> &CardResult {
        &self.card
    }

    fn forget_replaced(&mut self, report: &MergeReport) {
        for axis in Axis::ALL {
            let toggles = self.selection.axis_mut(axis);
            for key in &report.axis(axis).replaced {
                toggles.clear_under(std::slice::from_ref(key));
            }
        }
    }

    /// Reads the dataset file and merges it over the live model.
    ///
    /// Errors are only returned while nothing has been loaded yet. Later failures are logged and
    /// the current model is kept.
    pub fn load_dataset(&mut self, path: &Path) -> Result<LoadOutcome, FetchError> {
        let fresh = match dataset::load_dataset(path) {
            Ok(model) => model,
            Err(e) if self.model.is_empty() => return Err(e),
            Err(e) => {
                self.log.warn(format!("{e}; keeping previously loaded cards"));
                return Ok(LoadOutcome::KeptPrevious(e));
            }
        };
        let report = self.model.merge(&fresh).map_err(|source| FetchError::Model {
            path: path.to_path_buf(),
            source,
        })?;
        self.forget_replaced(&report);
        self.log.info(format!(
            "loaded {}: {} content / {} function categories",
            path.display(),
            self.model.tree(Axis::Content).len(),
            self.model.tree(Axis::Function).len()
        ));
        Ok(LoadOutcome::Loaded(report))
    }

    /// Imports an `.xlsx` upload and merges it. On any error the model is left as it was.
    pub fn import_workbook_bytes(&mut self, bytes: &[u8]) -> Result<MergeReport, ImportError> {
        let digest = hex::encode(Sha256::digest(bytes));
        let fragment = import::import_workbook_bytes(bytes)?;
        if self.last_import_digest.as_deref() == Some(digest.as_str()) {
            self.log.info(format!(
                "workbook {} uploaded again; its categories are overwritten",
                &digest[..12]
            ));
        }
        let report = self.model.merge(&fragment)?;
        self.forget_replaced(&report);
        self.log.info(format!(
            "imported workbook {}: {} categories ({} new, {} replaced)",
            &digest[..12],
            report.category_count(),
            report.content.inserted.len() + report.function.inserted.len(),
            report.content.replaced.len() + report.function.replaced.len()
        ));
        self.last_import_digest = Some(digest);
        Ok(report)
    }

    pub fn import_workbook_path(&mut self, path: &Path) -> Result<MergeReport, ImportError> {
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_workbook_bytes(&bytes)
    }

    pub fn set_selection(&mut self, axis: Axis, path: &NodePath, on: bool) -> Result<(), SelectionError> {
        self.selection
            .axis_mut(axis)
            .set(self.model.tree(axis), path.segments(), on)
    }

    pub fn set_all(&mut self, axis: Axis, on: bool) {
        self.selection.axis_mut(axis).set_all(self.model.tree(axis), on);
    }

    pub fn all_selected(&self, axis: Axis) -> bool {
        self.selection.axis(axis).all_selected(self.model.tree(axis))
    }

    pub fn eligible(&self, axis: Axis) -> Vec<String> {
        self.selection.axis(axis).eligible(self.model.tree(axis))
    }

    /// Flips the only-mode of `axis`. A card whose axis becomes suppressed shows its placeholder
    /// straight away.
    pub fn set_only_mode(&mut self, axis: Axis, on: bool) {
        self.mode.set_only(axis, on);
        for a in Axis::ALL {
            if self.mode.is_suppressed(a) {
                let placeholder = self.engine.placeholders().for_axis(a).to_string();
                self.card.set(a, placeholder);
            }
        }
    }

    /// Draws both cards. Each face that draws successfully is shown; a failing face keeps its
    /// previous text and its error is logged.
    pub fn draw(&mut self) -> DualDraw {
        let content = self.eligible(Axis::Content);
        let function = self.eligible(Axis::Function);
        let out = self.engine.draw(&content, &function, self.mode);
        for axis in Axis::ALL {
            match out.get(axis) {
                Ok(value) => self.card.set(axis, value.clone()),
                Err(e) => self.log.warn(e.to_string()),
            }
        }
        out
    }

    pub fn redraw(&mut self, axis: Axis) -> Result<String, SelectionError> {
        let eligible = self.eligible(axis);
        match self.engine.draw_axis(axis, &eligible, self.mode) {
            Ok(value) => {
                self.card.set(axis, value.clone());
                Ok(value)
            }
            Err(e) => {
                self.log.warn(e.to_string());
                Err(e)
            }
        }
    }

    /// A key press on the card of `axis`. Returns `None` for keys that do not activate it.
    pub fn activate_card(&mut self, axis: Axis, key: &str) -> Option<Result<String, SelectionError>> {
        is_activation_key(key).then(|| self.redraw(axis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{DEFAULT_CONTENT_PLACEHOLDER, DEFAULT_FUNCTION_PLACEHOLDER};
    use crate::model::Node;
    use crate::xlsx::template::template_workbook_bytes;

    fn session_with(json: &str) -> (Session, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cards_data.json");
        std::fs::write(&path, json).expect("write dataset");
        let mut session = Session::new(Placeholders::default(), Some(11), ConsoleLog::new(false));
        session.load_dataset(&path).expect("load");
        (session, dir)
    }

    fn sample() -> (Session, tempfile::TempDir) {
        session_with(r#"{"contentGroups":{"History":["A","B"]},"functionGroups":{"Recall":["Summarize"]}}"#)
    }

    #[test]
    fn single_selected_items_are_drawn() {
        let (mut session, _dir) = sample();
        session
            .set_selection(Axis::Content, &NodePath::parse("History > A"), true)
            .expect("select A");
        session
            .set_selection(Axis::Function, &NodePath::parse("Recall > Summarize"), true)
            .expect("select Summarize");

        for _ in 0..5 {
            assert!(session.draw().is_ok());
            assert_eq!(session.card().content, "A");
            assert_eq!(session.card().function, "Summarize");
        }
    }

    #[test]
    fn only_modes_exclude_each_other_and_show_placeholders() {
        let (mut session, _dir) = sample();
        session.set_selection(Axis::Content, &NodePath::parse("History"), true).expect("select");

        session.set_only_mode(Axis::Content, true);
        assert_eq!(session.card().function, DEFAULT_FUNCTION_PLACEHOLDER);
        let out = session.draw();
        assert!(out.is_ok());
        assert_eq!(session.card().function, DEFAULT_FUNCTION_PLACEHOLDER);
        assert!(["A", "B"].contains(&session.card().content.as_str()));

        session.set_only_mode(Axis::Function, true);
        assert!(!session.mode().content_only());
        assert!(session.mode().function_only());
        assert_eq!(session.card().content, DEFAULT_CONTENT_PLACEHOLDER);
        assert_eq!(
            session.draw().function,
            Err(SelectionError::NoEligibleItems(Axis::Function))
        );
        assert_eq!(session.card().content, DEFAULT_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn failing_axis_keeps_its_previous_face() {
        let (mut session, _dir) = sample();
        session.set_all(Axis::Content, true);
        session.set_all(Axis::Function, true);
        session.draw();
        session.set_all(Axis::Content, false);

        let out = session.draw();
        assert_eq!(out.errors().count(), 1);
        assert!(["A", "B"].contains(&session.card().content.as_str()));
        assert_eq!(session.card().function, "Summarize");
    }

    #[test]
    fn activation_keys_redraw_one_card() {
        let (mut session, _dir) = sample();
        session.set_all(Axis::Function, true);
        assert!(session.activate_card(Axis::Function, "Tab").is_none());
        assert_eq!(session.card().function, DEFAULT_FUNCTION_PLACEHOLDER);

        assert_eq!(
            session.activate_card(Axis::Function, " "),
            Some(Ok("Summarize".to_string()))
        );
        assert_eq!(
            session.activate_card(Axis::Content, "Enter"),
            Some(Err(SelectionError::NoEligibleItems(Axis::Content)))
        );
        assert_eq!(session.card().content, DEFAULT_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn import_merges_and_clears_replaced_toggles() {
        let (mut session, _dir) = sample();
        let bytes = template_workbook_bytes().expect("template");
        let first = session.import_workbook_bytes(&bytes).expect("import");
        assert_eq!(first.content.inserted.len(), 2);

        let (preloaded, uploaded) = session.model().partition(Axis::Content);
        assert_eq!(preloaded, vec!["History"]);
        assert_eq!(uploaded, vec!["(Uploaded) Greek History", "(Uploaded) Roman History"]);

        session
            .set_selection(Axis::Content, &NodePath::parse("(Uploaded) Greek History"), true)
            .expect("select");
        session.set_selection(Axis::Content, &NodePath::parse("History"), true).expect("select");
        assert_eq!(session.eligible(Axis::Content), vec!["A", "B", "The Battle of Marathon", "The Battle of Salamis"]);

        let second = session.import_workbook_bytes(&bytes).expect("re-import");
        assert_eq!(second.content.replaced.len(), 2);
        assert_eq!(session.model().tree(Axis::Content).len(), 3);
        assert_eq!(session.eligible(Axis::Content), vec!["A", "B"]);
    }

    #[test]
    fn failed_import_leaves_model_untouched() {
        let (mut session, _dir) = sample();
        let before = session.model().clone();
        let err = session.import_workbook_bytes(b"not a workbook").expect_err("garbage");
        assert!(matches!(err, ImportError::Archive(_)));
        assert_eq!(session.model(), &before);
    }

    #[test]
    fn reload_keeps_uploads_and_failed_reload_keeps_model() {
        let (mut session, dir) = sample();
        let bytes = template_workbook_bytes().expect("template");
        session.import_workbook_bytes(&bytes).expect("import");

        let path = dir.path().join("cards_data.json");
        std::fs::write(&path, r#"{"contentGroups":{"History":["C"]}}"#).expect("rewrite");
        assert!(matches!(session.load_dataset(&path), Ok(LoadOutcome::Loaded(_))));
        assert_eq!(
            session.model().tree(Axis::Content).get("History"),
            Some(&Node::leaves(["C"]))
        );
        assert!(session.model().tree(Axis::Content).contains("(Uploaded) Roman History"));

        let before = session.model().clone();
        std::fs::write(&path, "{").expect("corrupt");
        assert!(matches!(
            session.load_dataset(&path),
            Ok(LoadOutcome::KeptPrevious(FetchError::Shape { .. }))
        ));
        assert_eq!(session.model(), &before);
    }

    #[test]
    fn first_load_failure_is_returned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(Placeholders::default(), Some(1), ConsoleLog::new(false));
        let err = session
            .load_dataset(&dir.path().join("missing.json"))
            .expect_err("nothing loaded yet");
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
