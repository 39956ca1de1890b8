// src/orchestrator.rs

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ResolutionProfile, SwitcherConfig},
    constants::DISPLAY_TOOL_VERB,
    errors::SwitchError,
    nv_modes::{apply_resolution, AdapterStore, ApplySummary},
    utils::process::{CommandRunner, PrivilegeBroker},
};

/// Subcommand the elevated re-launch runs.
pub const FIX_NV_MODES_COMMAND: &str = "fix-nv-modes";

/// What `apply_nv_modes_fix` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The mutation ran in this process.
    Applied(ApplySummary),
    /// An elevated copy of this executable ran it and exited with 0.
    Delegated,
}

/// Sequences display tool invocations and the `NV_Modes` fix.
///
/// Holds no state between calls, so any command can be re-run after a
/// partial failure.
pub struct ProfileOrchestrator {
    config: SwitcherConfig,
    runner: Box<dyn CommandRunner>,
    broker: Box<dyn PrivilegeBroker>,
    store: Box<dyn AdapterStore>,
}

impl ProfileOrchestrator {
    pub fn new(
        config: SwitcherConfig,
        runner: Box<dyn CommandRunner>,
        broker: Box<dyn PrivilegeBroker>,
        store: Box<dyn AdapterStore>,
    ) -> Self {
        Self {
            config,
            runner,
            broker,
            store,
        }
    }

    /// Runs the display tool and fails on anything but exit code 0.
    fn run_display_tool(&self, args: Vec<String>) -> Result<()> {
        let tool = &self.config.display_tool;
        let code = self.runner.run(tool, &args)?;
        if code != 0 {
            return Err(SwitchError::ProcessFailed {
                program: format!("{} {}", tool.display(), args.join(" ")),
                code,
            }
            .into());
        }
        Ok(())
    }

    /// Switches the display to `profile`.
    ///
    /// The mode is validated before the display tool is started.
    pub fn apply(&self, profile: &ResolutionProfile) -> Result<()> {
        profile.validate()?;
        info!(
            "Switching to {} profile: {}x{} @ {} bpp.",
            profile.name, profile.width, profile.height, profile.bit_depth
        );

        self.run_display_tool(vec![
            DISPLAY_TOOL_VERB.to_string(),
            profile.width.to_string(),
            profile.height.to_string(),
            profile.bit_depth.to_string(),
        ])
        .with_context(|| format!("Failed to apply the {} profile", profile.name))?;

        debug!("{} profile applied.", profile.name);
        Ok(())
    }

    /// Adds the game resolution to every adapter's `NV_Modes` list.
    ///
    /// Without administrator rights the same command is re-launched through
    /// the privilege broker and its exit code becomes the result.
    pub fn apply_nv_modes_fix(&self, game: &ResolutionProfile) -> Result<FixOutcome> {
        if self.broker.is_elevated() {
            debug!("Already elevated, updating NV_Modes in-process.");
            let summary = apply_resolution(self.store.as_ref(), game.width, game.height)?;
            return Ok(FixOutcome::Applied(summary));
        }

        info!("Administrator rights are required to update NV_Modes, re-launching elevated.");
        let args = vec![
            "--settings".to_string(),
            self.config.settings_path.display().to_string(),
            FIX_NV_MODES_COMMAND.to_string(),
        ];
        let code = self.broker.run_elevated(&args)?;
        if code != 0 {
            return Err(SwitchError::ProcessFailed {
                program: format!("elevated {}", FIX_NV_MODES_COMMAND),
                code,
            }
            .into());
        }
        Ok(FixOutcome::Delegated)
    }

    /// Toggles every display in `display_ids`, in order, then applies `profile`.
    ///
    /// Toggles are independent: a failing monitor does not stop the others
    /// nor the profile change. A profile failure takes precedence; otherwise
    /// toggle failures are reported together.
    pub fn apply_mode_with_secondary_displays(
        &self,
        profile: &ResolutionProfile,
        display_ids: &[String],
    ) -> Result<()> {
        let mut failed = Vec::new();
        for id in display_ids {
            debug!("Toggling secondary display '{}'.", id);
            let args = vec![
                DISPLAY_TOOL_VERB.to_string(),
                format!("monitor:{}", id),
                "0".to_string(),
                "0".to_string(),
                "0".to_string(),
            ];
            if let Err(e) = self.run_display_tool(args) {
                warn!("Failed to toggle display '{}': {:#}", id, e);
                failed.push(id.clone());
            }
        }

        if let Err(e) = self.apply(profile) {
            if !failed.is_empty() {
                error!("Also failed to toggle: {}", failed.join(", "));
            }
            return Err(e);
        }

        if !failed.is_empty() {
            return Err(SwitchError::DisplayToggleFailed { failed }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        path::{Path, PathBuf},
        rc::Rc,
    };

    use super::*;
    use crate::{
        config::ProfileName,
        nv_modes::{codec::ModeListValue, tests::MemoryStore},
    };

    type CallLog = Rc<RefCell<Vec<String>>>;

    /// Records every invocation and answers with queued exit codes (0 once empty).
    struct FakeRunner {
        calls: CallLog,
        codes: RefCell<VecDeque<Result<i32, ()>>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[String]) -> Result<i32> {
            self.calls
                .borrow_mut()
                .push(format!("{} {}", program.display(), args.join(" ")));
            match self.codes.borrow_mut().pop_front() {
                Some(Ok(code)) => Ok(code),
                Some(Err(())) => Err(SwitchError::MissingExecutable(program.to_path_buf()).into()),
                None => Ok(0),
            }
        }
    }

    struct FakeBroker {
        elevated: bool,
        calls: CallLog,
        result: RefCell<Option<Result<i32>>>,
    }

    impl PrivilegeBroker for FakeBroker {
        fn is_elevated(&self) -> bool {
            self.elevated
        }

        fn run_elevated(&self, args: &[String]) -> Result<i32> {
            self.calls.borrow_mut().push(args.join(" "));
            self.result.borrow_mut().take().unwrap_or(Ok(0))
        }
    }

    struct Harness {
        orchestrator: ProfileOrchestrator,
        runner_calls: CallLog,
        broker_calls: CallLog,
    }

    fn harness(
        codes: Vec<Result<i32, ()>>,
        elevated: bool,
        elevated_result: Option<Result<i32>>,
        store: MemoryStore,
    ) -> Harness {
        let runner_calls = CallLog::default();
        let broker_calls = CallLog::default();
        let config = SwitcherConfig {
            display_tool: PathBuf::from("nircmd.exe"),
            adapter_class_path: "HKLM\\Test".to_string(),
            settings_path: PathBuf::from("C:\\cfg\\settings.json"),
        };
        let orchestrator = ProfileOrchestrator::new(
            config,
            Box::new(FakeRunner {
                calls: runner_calls.clone(),
                codes: RefCell::new(codes.into()),
            }),
            Box::new(FakeBroker {
                elevated,
                calls: broker_calls.clone(),
                result: RefCell::new(elevated_result),
            }),
            Box::new(store),
        );
        Harness {
            orchestrator,
            runner_calls,
            broker_calls,
        }
    }

    fn game(width: u32, height: u32) -> ResolutionProfile {
        ResolutionProfile {
            name: ProfileName::Game,
            width,
            height,
            bit_depth: 32,
        }
    }

    fn switch_error(err: &anyhow::Error) -> &SwitchError {
        err.downcast_ref::<SwitchError>()
            .expect("error should carry a SwitchError")
    }

    #[test]
    fn test_apply_invokes_display_tool() {
        let h = harness(vec![], false, None, MemoryStore::default());
        h.orchestrator.apply(&game(2100, 1440)).unwrap();
        assert_eq!(
            *h.runner_calls.borrow(),
            vec!["nircmd.exe setdisplay 2100 1440 32".to_string()]
        );
    }

    #[test]
    fn test_apply_rejects_out_of_range_mode_before_launch() {
        let h = harness(vec![], false, None, MemoryStore::default());
        let err = h.orchestrator.apply(&game(300, 1440)).unwrap_err();
        assert!(matches!(switch_error(&err), SwitchError::InvalidMode { .. }));
        assert!(h.runner_calls.borrow().is_empty());
    }

    #[test]
    fn test_apply_nonzero_exit_is_failure() {
        let h = harness(vec![Ok(2)], false, None, MemoryStore::default());
        let err = h.orchestrator.apply(&game(2100, 1440)).unwrap_err();
        assert!(matches!(
            switch_error(&err),
            SwitchError::ProcessFailed { code: 2, .. }
        ));
    }

    #[test]
    fn test_apply_missing_tool_is_environment_error() {
        let h = harness(vec![Err(())], false, None, MemoryStore::default());
        let err = h.orchestrator.apply(&game(2100, 1440)).unwrap_err();
        match switch_error(&err) {
            SwitchError::MissingExecutable(path) => assert_eq!(path, Path::new("nircmd.exe")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fix_runs_in_process_when_elevated() {
        let store = MemoryStore::with(&[(
            "0000",
            Some(ModeListValue::Single("1920x1080x8,16,32=1F;".to_string())),
        )]);
        let h = harness(vec![], true, None, store);

        let outcome = h.orchestrator.apply_nv_modes_fix(&game(2100, 1440)).unwrap();
        assert_eq!(
            outcome,
            FixOutcome::Applied(ApplySummary {
                examined: 1,
                updated: 1,
                unchanged: 0
            })
        );
        assert!(h.broker_calls.borrow().is_empty());
        assert!(h.runner_calls.borrow().is_empty());
    }

    #[test]
    fn test_fix_reports_missing_driver_state_when_elevated() {
        let h = harness(vec![], true, None, MemoryStore::with(&[("0000", None)]));
        let err = h.orchestrator.apply_nv_modes_fix(&game(2100, 1440)).unwrap_err();
        assert!(matches!(switch_error(&err), SwitchError::NoDriverState));
    }

    #[test]
    fn test_fix_relaunches_elevated() {
        let h = harness(vec![], false, Some(Ok(0)), MemoryStore::default());
        let outcome = h.orchestrator.apply_nv_modes_fix(&game(2100, 1440)).unwrap();
        assert_eq!(outcome, FixOutcome::Delegated);
        assert_eq!(
            *h.broker_calls.borrow(),
            vec!["--settings C:\\cfg\\settings.json fix-nv-modes".to_string()]
        );
    }

    #[test]
    fn test_fix_propagates_elevated_exit_code() {
        let h = harness(vec![], false, Some(Ok(1)), MemoryStore::default());
        let err = h.orchestrator.apply_nv_modes_fix(&game(2100, 1440)).unwrap_err();
        assert!(matches!(
            switch_error(&err),
            SwitchError::ProcessFailed { code: 1, .. }
        ));
    }

    #[test]
    fn test_fix_declined_elevation() {
        let declined: Result<i32> =
            Err(SwitchError::ElevationDenied("declined".to_string()).into());
        let h = harness(vec![], false, Some(declined), MemoryStore::default());
        let err = h.orchestrator.apply_nv_modes_fix(&game(2100, 1440)).unwrap_err();
        assert!(matches!(switch_error(&err), SwitchError::ElevationDenied(_)));
    }

    #[test]
    fn test_secondary_displays_toggle_in_order_before_mode_change() {
        let h = harness(vec![], false, None, MemoryStore::default());
        let displays = vec!["\\\\.\\DISPLAY2".to_string(), "\\\\.\\DISPLAY3".to_string()];
        h.orchestrator
            .apply_mode_with_secondary_displays(&game(2100, 1440), &displays)
            .unwrap();
        assert_eq!(
            *h.runner_calls.borrow(),
            vec![
                "nircmd.exe setdisplay monitor:\\\\.\\DISPLAY2 0 0 0".to_string(),
                "nircmd.exe setdisplay monitor:\\\\.\\DISPLAY3 0 0 0".to_string(),
                "nircmd.exe setdisplay 2100 1440 32".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_secondary_displays_is_plain_apply() {
        let h = harness(vec![], false, None, MemoryStore::default());
        h.orchestrator
            .apply_mode_with_secondary_displays(&game(2100, 1440), &[])
            .unwrap();
        assert_eq!(h.runner_calls.borrow().len(), 1);
    }

    #[test]
    fn test_failed_toggle_does_not_abort_others() {
        let h = harness(vec![Ok(1), Ok(0), Ok(0)], false, None, MemoryStore::default());
        let displays = vec!["1".to_string(), "2".to_string()];
        let err = h
            .orchestrator
            .apply_mode_with_secondary_displays(&game(2100, 1440), &displays)
            .unwrap_err();

        assert_eq!(h.runner_calls.borrow().len(), 3);
        match switch_error(&err) {
            SwitchError::DisplayToggleFailed { failed } => assert_eq!(failed, &vec!["1".to_string()]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_profile_failure_takes_precedence_over_toggle_failures() {
        let h = harness(vec![Ok(1), Ok(5)], false, None, MemoryStore::default());
        let displays = vec!["1".to_string()];
        let err = h
            .orchestrator
            .apply_mode_with_secondary_displays(&game(2100, 1440), &displays)
            .unwrap_err();
        assert!(matches!(
            switch_error(&err),
            SwitchError::ProcessFailed { code: 5, .. }
        ));
    }
}
