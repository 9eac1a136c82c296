//! Deterministic replays of window activity against a scripted system.
//!
//! A script lists screens and a sequence of steps. Time only moves when a
//! step says so, and any refresh or tick that comes due inside an `advance`
//! runs at its exact virtual time.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Command, CommandOutcome, Event, Grouper, Trigger};
use crate::actor;
use crate::actor::broadcast::{BroadcastEvent, BroadcastReceiver};
use crate::common::collections::HashMap;
use crate::common::config::Settings;
use crate::sys::geometry::Rect;
use crate::sys::screen::Screen;
use crate::sys::scripted::{RaiseCall, ScriptedWindows, scripted_window};
use crate::sys::window_server::{WindowId, WindowSnapshot};

/// `(x, y, width, height)`
pub type Frame = (f64, f64, f64, f64);

fn rect((x, y, width, height): Frame) -> Rect { Rect::new(x, y, width, height) }

fn yes() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub screens: Vec<ScriptScreen>,
    #[serde(default)]
    pub settings: Settings,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptScreen {
    pub frame: Frame,
    /// Defaults to the full frame.
    #[serde(default)]
    pub visible: Option<Frame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptWindow {
    pub id: u32,
    #[serde(default)]
    pub app: String,
    /// Defaults to the window id.
    #[serde(default)]
    pub pid: Option<i32>,
    pub frame: Frame,
    /// Whether the window reports a native window number.
    #[serde(default = "yes")]
    pub numbered: bool,
}

impl ScriptWindow {
    fn snapshot(&self) -> WindowSnapshot {
        scripted_window(
            self.numbered.then_some(self.id),
            self.id as u64,
            self.pid.unwrap_or(self.id as i32),
            &self.app,
            rect(self.frame),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Replaces the set of visible windows.
    Windows(Vec<ScriptWindow>),
    /// Changes a window's frame and reports it moved.
    Move { id: u32, frame: Frame },
    Close(u32),
    /// Focuses a window and reports the focus change.
    Focus(u32),
    Trust(bool),
    Trigger(Trigger),
    Command(Command),
    Tick,
    /// Moves the virtual clock forward by this many milliseconds.
    Advance(u64),
}

impl Script {
    pub fn read(path: &Path) -> anyhow::Result<Script> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Script> { Ok(ron::from_str(buf)?) }
}

#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub groups: Vec<Vec<WindowSnapshot>>,
    pub raises: Vec<RaiseCall>,
    pub outcomes: Vec<CommandOutcome>,
    pub events: Vec<BroadcastEvent>,
}

pub struct Replay {
    system: ScriptedWindows,
    grouper: Grouper<ScriptedWindows>,
    broadcasts: BroadcastReceiver,
    start: Instant,
    elapsed: Duration,
    next_tick: Duration,
    ids: HashMap<u32, WindowId>,
    report: ReplayReport,
}

impl Replay {
    pub fn new(screens: &[ScriptScreen], settings: Settings) -> Self {
        let screens = screens
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Screen::new(i as u32 + 1, rect(s.frame), rect(s.visible.unwrap_or(s.frame)))
            })
            .collect();
        let system = ScriptedWindows::new(screens);
        let (broadcast_tx, broadcasts) = actor::channel();
        let grouper = Grouper::new(system.clone(), settings, Some(broadcast_tx));
        let next_tick = grouper.settings.timing.tick;
        Self {
            system,
            grouper,
            broadcasts,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            next_tick,
            ids: HashMap::default(),
            report: ReplayReport::default(),
        }
    }

    pub fn run(script: &Script) -> anyhow::Result<ReplayReport> {
        let mut replay = Replay::new(&script.screens, script.settings.clone());
        for (index, step) in script.steps.iter().enumerate() {
            replay.step(step).with_context(|| format!("step {index}"))?;
        }
        Ok(replay.finish())
    }

    fn now(&self) -> Instant { self.start + self.elapsed }

    fn id(&self, id: u32) -> anyhow::Result<WindowId> {
        match self.ids.get(&id) {
            Some(&window) => Ok(window),
            None => bail!("unknown window {id}"),
        }
    }

    pub fn step(&mut self, step: &Step) -> anyhow::Result<()> {
        info!(at_ms = self.elapsed.as_millis() as u64, ?step, "replay step");
        match step {
            Step::Windows(windows) => {
                let snapshots: Vec<WindowSnapshot> = windows.iter().map(|w| w.snapshot()).collect();
                self.ids = snapshots.iter().map(|w| (w.element_id.0 as u32, w.id())).collect();
                self.system.set_windows(snapshots);
            }
            Step::Move { id, frame } => {
                self.system.set_frame(self.id(*id)?, rect(*frame));
                self.trigger(Trigger::WindowMoved);
            }
            Step::Close(id) => {
                self.system.close(self.id(*id)?);
            }
            Step::Focus(id) => {
                if !self.system.focus(self.id(*id)?) {
                    bail!("window {id} is closed");
                }
                self.trigger(Trigger::FocusChanged);
            }
            Step::Trust(trusted) => self.system.set_trusted(*trusted),
            Step::Trigger(trigger) => self.trigger(*trigger),
            Step::Command(command) => match self.grouper.execute(command.clone(), self.now()) {
                Ok(outcome) => self.report.outcomes.push(outcome),
                Err(e) => warn!("{command:?} failed: {e}"),
            },
            Step::Tick => self.grouper.tick(self.now()),
            Step::Advance(millis) => self.advance(Duration::from_millis(*millis)),
        }
        self.report.raises.extend(self.system.take_calls());
        Ok(())
    }

    fn trigger(&mut self, trigger: Trigger) {
        let now = self.now();
        self.grouper.handle_event(Event::Trigger(trigger), now);
    }

    /// Runs every refresh and tick due before `self.elapsed + by`, in order.
    fn advance(&mut self, by: Duration) {
        let target = self.elapsed + by;
        loop {
            let deadline = self
                .grouper
                .scheduler
                .deadline()
                .map(|d| d.saturating_duration_since(self.start))
                .filter(|d| *d <= target);
            let tick = Some(self.next_tick).filter(|t| *t <= target);
            match (deadline, tick) {
                (Some(deadline), Some(tick)) if tick < deadline => self.tick_at(tick),
                (Some(deadline), _) => {
                    self.elapsed = self.elapsed.max(deadline);
                    self.grouper.poll(self.now());
                }
                (None, Some(tick)) => self.tick_at(tick),
                (None, None) => break,
            }
        }
        self.elapsed = target;
    }

    fn tick_at(&mut self, at: Duration) {
        self.elapsed = self.elapsed.max(at);
        self.grouper.tick(self.now());
        self.next_tick = at + self.grouper.settings.timing.tick;
    }

    pub fn finish(mut self) -> ReplayReport {
        let now = self.now();
        self.report.groups = match self.grouper.snapshot() {
            Ok(windows) => self.grouper.store.groups(&windows, now),
            Err(e) => {
                warn!("no final groups: {e}");
                Vec::new()
            }
        };
        while let Ok((_, event)) = self.broadcasts.try_recv() {
            self.report.events.push(event);
        }
        self.report
    }
}
