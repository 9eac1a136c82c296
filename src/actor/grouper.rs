//! The grouper actor owns every piece of mutable grouping state.
//!
//! Triggers, commands and queries all arrive over one channel and are handled
//! one at a time on the grouper thread, so the store needs no locking. The
//! loop also sleeps until the debounce deadline and runs a slow background
//! tick that reconciles geometry changes nobody notified us about.

use std::future;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

pub mod diagnostics;
pub mod error;
pub mod pairing;
pub mod raise;
pub mod replay;
pub mod scheduler;

pub use error::GrouperError;
pub use scheduler::{Trigger, TriggerSet};

use self::pairing::FocusTracker;
use self::raise::Raiser;
use self::scheduler::RefreshScheduler;
use crate::actor;
use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::actor::config_watcher::ConfigWatcher;
use crate::common::config::{Config, Settings, clamp_edge_tolerance, clamp_min_overlap_ratio};
use crate::common::log::{Latch, Throttle};
use crate::layout_engine::Detector;
use crate::model::group_store::GroupStore;
use crate::model::manual::ManualSession;
use crate::sys::SysError;
use crate::sys::window_server::{WindowId, WindowSnapshot, WindowSystem, resolve_focused};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;
pub type Reply<T> = oneshot::Sender<T>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Re-evaluate now, bypassing the debounce.
    Refresh,
    SetEdgeTolerance(f64),
    SetMinOverlapRatio(f64),
    SetAutoGrouping(bool),
    SetNonActivatingRaise(bool),
    SetIncludeOtherSpaces(bool),
    ToggleManualSession,
    AddFocusedToSession,
    FinishSession,
    ListVisibleWindows,
    DumpFocusedContext,
    DumpRawWindows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Done,
    SessionActive(bool),
    SessionAdded { window: WindowId, count: usize },
    SessionFinished { members: Vec<WindowId>, raised: bool },
    Dump(Vec<String>),
}

#[derive(Debug)]
pub enum Query {
    CurrentGroups(Reply<Vec<Vec<WindowSnapshot>>>),
    GroupForFocused(Reply<Vec<WindowSnapshot>>),
    AutoGroupingEnabled(Reply<bool>),
    ManualSessionActive(Reply<bool>),
    Settings(Reply<Settings>),
}

#[derive(Debug)]
pub enum Event {
    Trigger(Trigger),
    Command(Command, Option<Reply<Result<CommandOutcome, GrouperError>>>),
    Query(Query),
    ConfigUpdated(Box<Config>),
}

pub struct Grouper<S: WindowSystem> {
    system: S,
    settings: Settings,
    detector: Detector,
    store: GroupStore,
    session: ManualSession,
    focus: FocusTracker,
    scheduler: RefreshScheduler,
    raiser: Raiser,
    trusted: Latch,
    tick_log: Throttle,
    dump_throttle: Throttle,
    anomaly_dumps: usize,
    last_groups: Vec<Vec<WindowId>>,
    last_raised: Option<Vec<WindowId>>,
    broadcast_tx: Option<BroadcastSender>,
}

impl<S: WindowSystem> Grouper<S> {
    pub fn new(system: S, mut settings: Settings, broadcast_tx: Option<BroadcastSender>) -> Self {
        let fixes = settings.auto_fix_values();
        if fixes > 0 {
            warn!(fixes, "corrected out-of-range settings");
        }
        let detector = Detector::new(&settings.detector, system.screens());
        Self {
            store: GroupStore::new(&settings.store),
            scheduler: RefreshScheduler::new(&settings.timing),
            raiser: Raiser::new(settings.non_activating_raise),
            tick_log: Throttle::new(settings.timing.tick_log_interval),
            dump_throttle: Throttle::new(settings.timing.diagnostic_dump_interval),
            session: ManualSession::default(),
            focus: FocusTracker::default(),
            trusted: Latch::default(),
            anomaly_dumps: 0,
            last_groups: Vec::new(),
            last_raised: None,
            system,
            settings,
            detector,
            broadcast_tx,
        }
    }

    /// Starts the grouper on its own thread and returns a handle to it.
    pub fn spawn(
        system: S,
        config: Config,
        broadcast_tx: Option<BroadcastSender>,
    ) -> Result<GrouperHandle, GrouperError> {
        let (events_tx, events) = actor::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        thread::Builder::new().name("grouper".to_string()).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("failed to build grouper runtime: {e}");
                    return;
                }
            };
            let grouper = Grouper::new(system, config.settings, broadcast_tx);
            runtime.block_on(grouper.run(events, token));
        })?;
        Ok(GrouperHandle { events: events_tx, cancel })
    }

    pub async fn run(mut self, mut events: Receiver, cancel: CancellationToken) {
        let mut period = self.settings.timing.tick;
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.scheduler.deadline().map(tokio::time::Instant::from_std);
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = events.recv() => match msg {
                    Some((span, event)) => {
                        let _guard = span.enter();
                        self.handle_event(event, now());
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => self.poll(now()),
                _ = tick.tick() => self.tick(now()),
            }

            if period != self.settings.timing.tick {
                period = self.settings.timing.tick;
                tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }
        debug!("grouper stopped");
    }

    #[instrument(name = "grouper::handle_event", skip(self, now), fields(event = ?event))]
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Trigger(trigger) => {
                if !self.scheduler.trigger(trigger, now) {
                    trace!(%trigger, "trigger suppressed");
                }
            }
            Event::Command(command, reply) => {
                let result = self.execute(command, now);
                if let Err(e) = &result {
                    warn!("command failed: {e}");
                }
                if let Some(reply) = reply {
                    _ = reply.send(result);
                }
            }
            Event::Query(query) => self.answer(query, now),
            Event::ConfigUpdated(config) => self.apply_settings(config.settings),
        }
    }

    /// Runs the pending refresh if its debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        if let Some(triggers) = self.scheduler.poll(now) {
            self.refresh(now, triggers);
        }
    }

    /// One full evaluation: reconcile, pair, and bring the focused group
    /// forward if focus moved or a pair was just formed.
    #[instrument(name = "grouper::refresh", skip(self, now))]
    pub fn refresh(&mut self, now: Instant, triggers: TriggerSet) {
        if !self.check_trust() {
            return;
        }
        let windows = match self.snapshot() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("skipping refresh: {e}");
                return;
            }
        };
        let summary = self.store.update(&windows, now);
        if !summary.is_quiet() {
            debug!(?summary, "reconciled");
        }

        let Some(focused) = self.resolve_focus(&windows) else {
            trace!("no focused window");
            self.publish_groups(&windows);
            return;
        };
        let focus_changed = self.focus.observe(focused.id());

        let mut formed = false;
        if self.settings.auto_grouping && !self.session.is_active() {
            let decision = pairing::evaluate(
                &mut self.store,
                &self.detector,
                focused,
                self.focus.previous(),
                &windows,
                now,
            );
            formed = decision.formed;
        }

        if (focus_changed || formed) && !self.session.is_active() {
            let members = self.store.group_for(focused, &windows, true, now);
            if members.len() >= 2 {
                self.raise(&members, focused, now);
            }
        }
        self.publish_groups(&windows);
    }

    /// Background reconciliation. Never pairs or raises.
    pub fn tick(&mut self, now: Instant) {
        if !self.check_trust() {
            return;
        }
        let windows = match self.snapshot() {
            Ok(windows) => windows,
            Err(e) => {
                debug!("skipping tick: {e}");
                return;
            }
        };
        let summary = self.store.update(&windows, now);
        if self.tick_log.ready(now) {
            debug!(
                windows = windows.len(),
                tracked = self.store.tracked_count(),
                groups = self.store.group_count(),
                anomaly_dumps = self.anomaly_dumps,
                ?summary,
                "tick"
            );
        }

        let focused = self.system.focused_window();
        if let Some(reason) = diagnostics::anomaly(focused.as_ref(), &windows)
            && self.dump_throttle.ready(now)
        {
            self.anomaly_dumps += 1;
            warn!("{reason}");
            let lines = diagnostics::focused_context(
                focused.as_ref(),
                &windows,
                &self.detector,
                &self.store,
                now,
            );
            for line in lines {
                info!("{line}");
            }
        }
        self.publish_groups(&windows);
    }

    pub fn execute(&mut self, command: Command, now: Instant) -> Result<CommandOutcome, GrouperError> {
        let outcome = match command {
            Command::Refresh => {
                self.scheduler.cancel();
                self.refresh(now, TriggerSet::empty());
                CommandOutcome::Done
            }
            Command::SetEdgeTolerance(value) => {
                let mut settings = self.settings.clone();
                settings.detector.edge_tolerance = clamp_edge_tolerance(value);
                self.apply_settings(settings);
                CommandOutcome::Done
            }
            Command::SetMinOverlapRatio(value) => {
                let mut settings = self.settings.clone();
                settings.detector.min_overlap_ratio = clamp_min_overlap_ratio(value);
                self.apply_settings(settings);
                CommandOutcome::Done
            }
            Command::SetAutoGrouping(enabled) => {
                let mut settings = self.settings.clone();
                settings.auto_grouping = enabled;
                self.apply_settings(settings);
                CommandOutcome::Done
            }
            Command::SetNonActivatingRaise(enabled) => {
                let mut settings = self.settings.clone();
                settings.non_activating_raise = enabled;
                self.apply_settings(settings);
                CommandOutcome::Done
            }
            Command::SetIncludeOtherSpaces(enabled) => {
                let mut settings = self.settings.clone();
                settings.include_other_spaces = enabled;
                self.apply_settings(settings);
                CommandOutcome::Done
            }
            Command::ToggleManualSession => {
                CommandOutcome::SessionActive(self.session.toggle(&mut self.store))
            }
            Command::AddFocusedToSession => self.add_focused_to_session(now)?,
            Command::FinishSession => self.finish_session(now)?,
            Command::ListVisibleWindows => {
                let windows = self.snapshot()?;
                self.dump(diagnostics::visible_windows(&windows, &self.detector, &self.store))
            }
            Command::DumpFocusedContext => {
                let windows = self.snapshot()?;
                let focused = self.system.focused_window();
                self.dump(diagnostics::focused_context(
                    focused.as_ref(),
                    &windows,
                    &self.detector,
                    &self.store,
                    now,
                ))
            }
            Command::DumpRawWindows => {
                let lines = self.system.raw_window_list()?;
                self.dump(lines)
            }
        };
        Ok(outcome)
    }

    fn add_focused_to_session(&mut self, now: Instant) -> Result<CommandOutcome, GrouperError> {
        if !self.session.is_active() {
            info!("no manual session active");
            return Ok(CommandOutcome::SessionActive(false));
        }
        let windows = self.snapshot()?;
        self.store.update(&windows, now);
        let Some(focused) = self.resolve_focus(&windows) else {
            info!("no focused window to add");
            return Ok(CommandOutcome::Done);
        };
        let window = focused.id();
        let count = self.session.add_focused(&mut self.store, focused, now).unwrap_or_default();
        Ok(CommandOutcome::SessionAdded { window, count })
    }

    fn finish_session(&mut self, now: Instant) -> Result<CommandOutcome, GrouperError> {
        let windows = self.snapshot()?;
        self.store.update(&windows, now);
        let Some(finished) = self.session.finish(&mut self.store, &windows, now) else {
            info!("no manual session active");
            return Ok(CommandOutcome::SessionActive(false));
        };

        let mut raised = false;
        if finished.members.len() >= 2
            && let Some(focused) = self.resolve_focus(&windows)
            && finished.members.iter().any(|m| m.id() == focused.id())
        {
            self.raise(&finished.members, focused, now);
            raised = true;
        }
        self.publish_groups(&windows);

        let mut members: Vec<WindowId> = finished.members.iter().map(WindowSnapshot::id).collect();
        members.sort();
        Ok(CommandOutcome::SessionFinished { members, raised })
    }

    fn answer(&mut self, query: Query, now: Instant) {
        match query {
            Query::CurrentGroups(reply) => {
                let groups = match self.snapshot() {
                    Ok(windows) => {
                        let groups = self.store.groups(&windows, now);
                        self.publish_groups(&windows);
                        groups
                    }
                    Err(e) => {
                        debug!("no groups: {e}");
                        Vec::new()
                    }
                };
                _ = reply.send(groups);
            }
            Query::GroupForFocused(reply) => {
                let group = match self.snapshot() {
                    Ok(windows) => {
                        let group = match self.resolve_focus(&windows) {
                            Some(focused) => self.store.group_for(focused, &windows, false, now),
                            None => Vec::new(),
                        };
                        self.publish_groups(&windows);
                        group
                    }
                    Err(e) => {
                        debug!("no group: {e}");
                        Vec::new()
                    }
                };
                _ = reply.send(group);
            }
            Query::AutoGroupingEnabled(reply) => {
                _ = reply.send(self.settings.auto_grouping);
            }
            Query::ManualSessionActive(reply) => {
                _ = reply.send(self.session.is_active());
            }
            Query::Settings(reply) => {
                _ = reply.send(self.settings.clone());
            }
        }
    }

    fn apply_settings(&mut self, mut settings: Settings) {
        let fixes = settings.auto_fix_values();
        if fixes > 0 {
            warn!(fixes, "corrected out-of-range settings");
        }
        if settings == self.settings {
            return;
        }
        self.detector.update_settings(&settings.detector);
        self.store.update_settings(&settings.store);
        self.scheduler.update_settings(&settings.timing);
        self.raiser.set_non_activating(settings.non_activating_raise);
        self.tick_log.set_interval(settings.timing.tick_log_interval);
        self.dump_throttle.set_interval(settings.timing.diagnostic_dump_interval);
        info!(
            auto_grouping = settings.auto_grouping,
            edge_tolerance = settings.detector.edge_tolerance,
            min_overlap_ratio = settings.detector.min_overlap_ratio,
            "settings applied"
        );
        self.settings = settings;
    }

    fn check_trust(&mut self) -> bool {
        let trusted = self.system.is_trusted();
        let before = self.trusted.get();
        if self.trusted.changed(trusted) {
            if !trusted {
                warn!("accessibility access is missing, grouping paused");
            } else if before.is_some() {
                info!("accessibility access granted, grouping resumed");
            }
        }
        trusted
    }

    /// Fresh windows with anything outside every known screen filtered out.
    fn snapshot(&mut self) -> Result<Vec<WindowSnapshot>, SysError> {
        self.detector.set_screens(self.system.screens());
        let mut windows = self.system.visible_windows(self.settings.include_other_spaces)?;
        let total = windows.len();
        windows.retain(|w| self.detector.screen_index_of(&w.frame).is_some());
        if windows.len() != total {
            trace!(excluded = total - windows.len(), "ignoring windows outside every screen");
        }
        Ok(windows)
    }

    fn resolve_focus<'a>(&self, windows: &'a [WindowSnapshot]) -> Option<&'a WindowSnapshot> {
        let focused = self.system.focused_window()?;
        let (window, matched_by) = resolve_focused(&focused, windows)?;
        trace!(window = %window.id(), %matched_by, "resolved focus");
        Some(window)
    }

    fn raise(&mut self, members: &[WindowSnapshot], focused: &WindowSnapshot, now: Instant) {
        self.raiser.raise_group(&self.system, members, focused);
        self.scheduler.suppress(now);

        let mut ids: Vec<WindowId> = members.iter().map(WindowSnapshot::id).collect();
        ids.sort();
        if self.last_raised.as_ref() != Some(&ids) {
            self.last_raised = Some(ids);
            self.broadcast(BroadcastEvent::GroupRaised { members: members.to_vec() });
        }
    }

    fn publish_groups(&mut self, windows: &[WindowSnapshot]) {
        let mut groups: Vec<Vec<WindowId>> = self
            .store
            .current_groups(windows)
            .iter()
            .map(|group| {
                let mut ids: Vec<WindowId> = group.iter().map(WindowSnapshot::id).collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort();
        if groups != self.last_groups {
            self.last_groups = groups.clone();
            self.broadcast(BroadcastEvent::GroupsChanged { groups });
        }
    }

    fn dump(&self, lines: Vec<String>) -> CommandOutcome {
        for line in &lines {
            info!("{line}");
        }
        CommandOutcome::Dump(lines)
    }

    fn broadcast(&self, event: BroadcastEvent) {
        if let Some(tx) = &self.broadcast_tx {
            tx.send(event);
        }
    }
}

fn now() -> Instant { tokio::time::Instant::now().into_std() }

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Thread-agnostic entry point to a running grouper.
///
/// The blocking methods must not be called from inside an async runtime; use
/// the async variants there.
#[derive(Clone)]
pub struct GrouperHandle {
    events: Sender,
    cancel: CancellationToken,
}

impl GrouperHandle {
    pub fn trigger(&self, trigger: Trigger) { self.events.send(Event::Trigger(trigger)); }

    pub fn command_blocking(&self, command: Command) -> Result<CommandOutcome, GrouperError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .try_send(Event::Command(command, Some(tx)))
            .map_err(|_| GrouperError::ChannelClosed)?;
        rx.blocking_recv().map_err(|_| GrouperError::NoResponse)?
    }

    pub async fn command(&self, command: Command) -> Result<CommandOutcome, GrouperError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .try_send(Event::Command(command, Some(tx)))
            .map_err(|_| GrouperError::ChannelClosed)?;
        rx.await.map_err(|_| GrouperError::NoResponse)?
    }

    pub fn query_blocking<T>(
        &self,
        query: impl FnOnce(Reply<T>) -> Query,
    ) -> Result<T, GrouperError> {
        let (tx, rx) = oneshot::channel();
        self.events.try_send(Event::Query(query(tx))).map_err(|_| GrouperError::ChannelClosed)?;
        rx.blocking_recv().map_err(|_| GrouperError::NoResponse)
    }

    pub async fn query<T>(&self, query: impl FnOnce(Reply<T>) -> Query) -> Result<T, GrouperError> {
        let (tx, rx) = oneshot::channel();
        self.events.try_send(Event::Query(query(tx))).map_err(|_| GrouperError::ChannelClosed)?;
        rx.await.map_err(|_| GrouperError::NoResponse)
    }

    pub fn current_groups(&self) -> Result<Vec<Vec<WindowSnapshot>>, GrouperError> {
        self.query_blocking(Query::CurrentGroups)
    }

    pub fn group_for_focused(&self) -> Result<Vec<WindowSnapshot>, GrouperError> {
        self.query_blocking(Query::GroupForFocused)
    }

    pub fn auto_grouping_enabled(&self) -> Result<bool, GrouperError> {
        self.query_blocking(Query::AutoGroupingEnabled)
    }

    pub fn manual_session_active(&self) -> Result<bool, GrouperError> {
        self.query_blocking(Query::ManualSessionActive)
    }

    pub fn settings(&self) -> Result<Settings, GrouperError> {
        self.query_blocking(Query::Settings)
    }

    /// Applies the settings in `file` whenever it changes on disk. The file
    /// must exist.
    pub fn watch_config(&self, file: PathBuf, poll_interval: Duration) -> std::io::Result<()> {
        ConfigWatcher::spawn(file, self.events.clone(), poll_interval)
    }

    pub fn shutdown(&self) { self.cancel.cancel(); }
}
