//! Light aggregation and the shared activation protocol.

use grotto_core::{Activation, ColorCounts, EntityId, Layer, LightColor, PanelConfig};
use grotto_world::{GameController, GridSystem};
use tracing::{debug, trace};

use crate::{piston::Piston, transition::Progress, tunnel::Tunnel};

/// One coloured light on a panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Light {
    /// Colour of button that powers this light.
    pub color: LightColor,
    /// Whether the light currently receives a button.
    pub on: bool,
}

/// Machinery a panel drives.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelKind {
    /// Only the driven entity's state changes.
    Basic,
    /// Extends or retracts a piston's arms.
    Piston(Piston),
    /// Opens or closes a tunnel door.
    Tunnel(Tunnel),
}

/// An activation panel: lights in, physical change out.
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    entity: EntityId,
    lights: Vec<Light>,
    inverted: bool,
    gate_index: Option<u32>,
    activation: Activation,
    kind: PanelKind,
}

impl Panel {
    /// Builds a panel for the entity `config` points at, choosing the kind
    /// from the entity's layer. Returns `None` when the cell is empty.
    #[must_use]
    pub fn from_config(grid: &GridSystem, config: &PanelConfig) -> Option<Self> {
        let entity = grid.get_data(config.coordinates, config.layer)?;
        let kind = match config.layer {
            Layer::Piston => PanelKind::Piston(Piston::new(grid, grid.primary_of(entity))),
            Layer::Tunnel => PanelKind::Tunnel(Tunnel::new(entity)),
            _ => PanelKind::Basic,
        };
        let entity = match &kind {
            PanelKind::Piston(piston) => piston.base(),
            _ => entity,
        };

        let physical = grid.entity(entity).map_or(Activation::Off, |e| e.activation());
        let logical = match physical {
            Activation::Alt => Activation::Off,
            other if config.inverted => other.inverted(),
            other => other,
        };
        Some(Self {
            entity,
            lights: config
                .lights
                .iter()
                .map(|color| Light {
                    color: *color,
                    on: false,
                })
                .collect(),
            inverted: config.inverted,
            gate_index: config.gate_index,
            activation: logical,
            kind,
        })
    }

    /// Entity whose state records the panel's physical activation.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Lights, left to right.
    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Whether the physical result moves opposite to the lights.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Index of the gate driving this panel, if any.
    #[must_use]
    pub fn gate_index(&self) -> Option<u32> {
        self.gate_index
    }

    /// Last activation requested through [`Panel::set_panel`], before
    /// inversion.
    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Driven machinery.
    #[must_use]
    pub fn kind(&self) -> &PanelKind {
        &self.kind
    }

    /// Whether an animation is in flight.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        match &self.kind {
            PanelKind::Basic => false,
            PanelKind::Piston(piston) => piston.is_moving(),
            PanelKind::Tunnel(tunnel) => tunnel.is_moving(),
        }
    }

    /// Lights each light from the remaining button counts, left to right,
    /// one count per light, and returns the derived activation.
    pub fn update_lights(&mut self, counts: &ColorCounts) -> Activation {
        let mut remaining = *counts;
        for light in &mut self.lights {
            light.on = remaining.take(light.color);
        }
        self.check_lights()
    }

    /// `On` when every light is on, `Off` otherwise.
    #[must_use]
    pub fn check_lights(&self) -> Activation {
        if self.lights.iter().all(|light| light.on) {
            Activation::On
        } else {
            Activation::Off
        }
    }

    /// Requests `activation`.
    ///
    /// A closing tunnel door stops one frame short (`Alt`) when the player
    /// stands in its doorway. Inverted panels swap `Off` and `On`. The
    /// controller may veto the change, in which case nothing happens and
    /// `false` is returned.
    pub fn set_panel(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        activation: Activation,
        instant: bool,
    ) -> bool {
        let mut requested = activation;
        if let PanelKind::Tunnel(tunnel) = &self.kind {
            if !instant && requested == Activation::Off && tunnel.player_in_doorway(grid) {
                requested = Activation::Alt;
            }
        }
        let physical = if self.inverted {
            requested.inverted()
        } else {
            requested
        };

        if !controller.set_puzzle_activation(grid, self.entity, physical, instant) {
            debug!(panel = %self.entity, ?physical, "panel change vetoed");
            return false;
        }
        if !instant && physical != Activation::Alt {
            let hint = self.lights.first().map(|light| light.color);
            controller.check_off_screen_action(grid, self.entity, hint, physical);
        }

        self.activation = activation;
        let _ = grid.set_state(self.entity, physical.as_state());
        trace!(panel = %self.entity, ?physical, instant, "panel set");
        let _ = match &mut self.kind {
            PanelKind::Basic => Progress::Done,
            PanelKind::Piston(piston) => piston.set_activation(grid, controller, physical, instant),
            PanelKind::Tunnel(tunnel) => tunnel.set_activation(grid, physical, instant),
        };
        true
    }

    /// Re-derives the activation from `counts` and requests it when it
    /// changed. Gate panels ignore lights entirely.
    pub fn refresh(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        counts: &ColorCounts,
        instant: bool,
    ) -> bool {
        if self.gate_index.is_some() {
            return false;
        }
        let next = self.update_lights(counts);
        if next == self.activation {
            return false;
        }
        self.set_panel(grid, controller, next, instant)
    }

    /// Drives a gate panel directly. Panels without a gate index refuse.
    pub fn drive_gate(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        active: bool,
        instant: bool,
    ) -> bool {
        if self.gate_index.is_none() {
            return false;
        }
        let activation = if active {
            Activation::On
        } else {
            Activation::Off
        };
        self.set_panel(grid, controller, activation, instant)
    }

    /// Advances the panel's animation by `dt` seconds.
    pub fn advance(
        &mut self,
        dt: f32,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
    ) -> Progress {
        match &mut self.kind {
            PanelKind::Basic => Progress::Done,
            PanelKind::Piston(piston) => piston.advance(dt, grid, controller),
            PanelKind::Tunnel(tunnel) => tunnel.advance(dt, grid, &*controller),
        }
    }

    /// Load-time reconciliation of piston arms; other kinds have nothing to
    /// reconcile. Returns the number of entities forced.
    pub fn update_if_blocked(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        instant: bool,
    ) -> usize {
        match &mut self.kind {
            PanelKind::Piston(piston) => piston.update_if_blocked(grid, controller, instant),
            PanelKind::Basic | PanelKind::Tunnel(_) => 0,
        }
    }
}
