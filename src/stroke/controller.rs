//! Controller binding and drawing state machine
//!
//! Slots move `Disconnected -> Unbound -> Bound`; a bound slot is either idle
//! or drawing. Drawing intent comes from the select action, the trigger axis,
//! or both, depending on [`TriggerPolicy`].
//!
//! The surface holds a single open stroke, so at most one binding draws at a
//! time. A binding that wants to draw while another one is drawing waits
//! until that stroke ends.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::config::StrokeConfig;
use crate::events::AppEvent;
use crate::input::{ControllerEvent, ControllerSample, InputDevice, Slot, Vec3};

use super::surface::DrawingSurface;

/// Which inputs count as "pen down"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Select action only
    Select,
    /// Trigger axis only
    Axis,
    /// Either one held
    #[default]
    Both,
}

impl TriggerPolicy {
    pub fn uses_select(self) -> bool {
        matches!(self, TriggerPolicy::Select | TriggerPolicy::Both)
    }

    pub fn uses_axis(self) -> bool {
        matches!(self, TriggerPolicy::Axis | TriggerPolicy::Both)
    }
}

impl std::fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerPolicy::Select => write!(f, "select"),
            TriggerPolicy::Axis => write!(f, "axis"),
            TriggerPolicy::Both => write!(f, "both"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown trigger policy `{0}` (expected select, axis or both)")]
pub struct ParsePolicyError(String);

impl FromStr for TriggerPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(TriggerPolicy::Select),
            "axis" => Ok(TriggerPolicy::Axis),
            "both" => Ok(TriggerPolicy::Both),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// One pen-down gesture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrokeSession {
    active: bool,
    last_point: Option<Vec3>,
    points: usize,
}

impl StrokeSession {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last point sent to the surface; `None` unless active
    pub fn last_point(&self) -> Option<Vec3> {
        self.last_point
    }

    pub fn points(&self) -> usize {
        self.points
    }

    fn begin(&mut self, point: Vec3) {
        self.active = true;
        self.last_point = Some(point);
        self.points = 1;
    }

    fn extend(&mut self, point: Vec3) {
        self.last_point = Some(point);
        self.points += 1;
    }

    /// Close the stroke, returning its point count
    fn end(&mut self) -> usize {
        let points = self.points;
        *self = Self::default();
        points
    }
}

#[derive(Debug)]
struct ControllerBinding {
    profile: String,
    select_held: bool,
    axis_held: bool,
    /// Stroke began during this frame's event drain or update
    began_this_frame: bool,
    stroke: StrokeSession,
}

impl ControllerBinding {
    fn new(profile: String) -> Self {
        Self {
            profile,
            select_held: false,
            axis_held: false,
            began_this_frame: false,
            stroke: StrokeSession::default(),
        }
    }

    fn wants_drawing(&self, policy: TriggerPolicy) -> bool {
        (self.select_held && policy.uses_select()) || (self.axis_held && policy.uses_axis())
    }
}

/// Observable state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Disconnected,
    /// Connected, but its profiles did not match
    Unbound,
    Bound { drawing: bool },
}

/// Binds stylus controllers and turns their input into surface strokes
pub struct StrokeController {
    config: StrokeConfig,
    connected: HashSet<Slot>,
    bindings: BTreeMap<Slot, ControllerBinding>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl StrokeController {
    pub fn new(config: StrokeConfig, event_tx: broadcast::Sender<AppEvent>) -> Self {
        Self {
            config,
            connected: HashSet::new(),
            bindings: BTreeMap::new(),
            event_tx,
        }
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.config.trigger_policy
    }

    pub fn slot_state(&self, slot: Slot) -> SlotState {
        match self.bindings.get(&slot) {
            Some(binding) => SlotState::Bound {
                drawing: binding.stroke.is_active(),
            },
            None if self.connected.contains(&slot) => SlotState::Unbound,
            None => SlotState::Disconnected,
        }
    }

    pub fn is_drawing(&self, slot: Slot) -> bool {
        matches!(self.slot_state(slot), SlotState::Bound { drawing: true })
    }

    pub fn stroke(&self, slot: Slot) -> Option<&StrokeSession> {
        self.bindings.get(&slot).map(|b| &b.stroke)
    }

    /// Slot whose stroke is currently open on the surface
    pub fn drawing_slot(&self) -> Option<Slot> {
        drawing_slot(&self.bindings)
    }

    pub fn bound_slots(&self) -> Vec<Slot> {
        self.bindings.keys().copied().collect()
    }

    /// Dispatch one discrete controller event
    pub fn handle_event(
        &mut self,
        event: ControllerEvent,
        input: &dyn InputDevice,
        surface: &mut dyn DrawingSurface,
    ) {
        match event {
            ControllerEvent::Connected { slot, profiles } => self.on_connected(slot, &profiles),
            ControllerEvent::Disconnected { slot } => self.on_disconnected(slot),
            ControllerEvent::SelectStart { slot } => self.on_select_start(slot, input, surface),
            ControllerEvent::SelectEnd { slot } => self.on_select_end(slot),
        }
    }

    pub fn on_connected(&mut self, slot: Slot, profiles: &[String]) {
        self.connected.insert(slot);
        if let Some(old) = self.bindings.remove(&slot) {
            debug!(slot, profile = %old.profile, "slot reconnected, dropping previous binding");
            self.finish_stroke(slot, old.stroke);
        }

        let accepted = &self.config.accepted_profile;
        if !profiles.iter().any(|p| p == accepted) {
            debug!(slot, ?profiles, "ignoring controller without accepted profile");
            return;
        }

        info!(slot, profile = %accepted, "controller bound");
        self.bindings
            .insert(slot, ControllerBinding::new(accepted.clone()));
        self.emit(AppEvent::ControllerBound {
            slot,
            profile: accepted.clone(),
        });
    }

    pub fn on_disconnected(&mut self, slot: Slot) {
        self.connected.remove(&slot);
        let Some(binding) = self.bindings.remove(&slot) else {
            return;
        };

        self.finish_stroke(slot, binding.stroke);
        info!(slot, "controller unbound");
        self.emit(AppEvent::ControllerUnbound { slot });
    }

    pub fn on_select_start(
        &mut self,
        slot: Slot,
        input: &dyn InputDevice,
        surface: &mut dyn DrawingSurface,
    ) {
        let policy = self.config.trigger_policy;
        let owner = drawing_slot(&self.bindings);
        let Some(binding) = self.bindings.get_mut(&slot) else {
            return;
        };
        binding.select_held = true;

        if !policy.uses_select() || binding.stroke.is_active() {
            return;
        }
        if let Some(owner) = owner {
            debug!(slot, owner, "another controller is drawing");
            return;
        }
        let Some(sample) = input.sample(slot) else {
            debug!(slot, "select without a tracked pose");
            return;
        };

        surface.begin_stroke(sample.position);
        binding.stroke.begin(sample.position);
        binding.began_this_frame = true;
        self.emit(AppEvent::StrokeStarted { slot });
    }

    pub fn on_select_end(&mut self, slot: Slot) {
        let policy = self.config.trigger_policy;
        let Some(binding) = self.bindings.get_mut(&slot) else {
            return;
        };
        binding.select_held = false;

        if binding.stroke.is_active() && !binding.wants_drawing(policy) {
            let stroke = std::mem::take(&mut binding.stroke);
            self.finish_stroke(slot, stroke);
        }
    }

    /// Per-frame poll of every bound device
    pub fn update(&mut self, input: &dyn InputDevice, surface: &mut dyn DrawingSurface) {
        let Self {
            config,
            bindings,
            event_tx,
            ..
        } = self;
        let policy = config.trigger_policy;
        let mut extended = false;
        let mut owner = drawing_slot(bindings);

        for (&slot, binding) in bindings.iter_mut() {
            let Some(sample) = input.sample(slot) else {
                binding.began_this_frame = false;
                continue;
            };
            if config.debug_buttons {
                log_buttons(slot, &sample);
            }

            binding.axis_held = sample.button_value(config.trigger_button) > config.trigger_threshold;
            let wants = binding.wants_drawing(policy);

            match (wants, binding.stroke.is_active()) {
                (true, false) if owner.is_none() => {
                    surface.begin_stroke(sample.position);
                    binding.stroke.begin(sample.position);
                    owner = Some(slot);
                    emit(event_tx, AppEvent::StrokeStarted { slot });
                }
                (true, true) if !binding.began_this_frame => {
                    surface.extend_stroke(sample.position);
                    binding.stroke.extend(sample.position);
                    extended = true;
                }
                (false, true) => {
                    let points = binding.stroke.end();
                    owner = None;
                    emit(event_tx, AppEvent::StrokeFinished { slot, points });
                }
                _ => {}
            }
            binding.began_this_frame = false;
        }

        if extended {
            surface.refresh();
        }
    }

    fn finish_stroke(&self, slot: Slot, mut stroke: StrokeSession) {
        if stroke.is_active() {
            let points = stroke.end();
            self.emit(AppEvent::StrokeFinished { slot, points });
        }
    }

    fn emit(&self, event: AppEvent) {
        emit(&self.event_tx, event);
    }
}

fn drawing_slot(bindings: &BTreeMap<Slot, ControllerBinding>) -> Option<Slot> {
    bindings
        .iter()
        .find(|(_, binding)| binding.stroke.is_active())
        .map(|(&slot, _)| slot)
}

fn emit(tx: &broadcast::Sender<AppEvent>, event: AppEvent) {
    debug!(%event, "emitting stroke event");
    let _ = tx.send(event);
}

fn log_buttons(slot: Slot, sample: &ControllerSample) {
    for (index, button) in sample.buttons.iter().enumerate() {
        if button.pressed || button.touched {
            trace!(
                slot,
                index,
                pressed = button.pressed,
                touched = button.touched,
                value = button.value,
                "gamepad button"
            );
        }
    }
}
