//! # Routing Table
//!
//! Static assignment of output channels to sources.

use crate::config::RoutingConfig;

/// How an output axis is sourced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisClass {
    /// Switches between physical and vision with the mode
    Primary,
    /// Always physical
    Auxiliary,
}

/// Output channel layout
///
/// Axes are kept sorted by index with primary and auxiliary merged, buttons
/// sorted with the mode button removed. Frames are composed in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    axes: Vec<(u8, AxisClass)>,
    buttons: Vec<u8>,
    mode_button: u8,
}

impl RoutingTable {
    /// Builds the table from explicit index lists.
    ///
    /// Duplicate indices collapse to one entry; an index listed as both
    /// primary and auxiliary is primary.
    #[must_use]
    pub fn new(primary: &[u8], auxiliary: &[u8], buttons: &[u8], mode_button: u8) -> Self {
        let mut axes: Vec<(u8, AxisClass)> = primary
            .iter()
            .map(|&index| (index, AxisClass::Primary))
            .chain(auxiliary.iter().map(|&index| (index, AxisClass::Auxiliary)))
            .collect();
        // Stable sort keeps the primary entry first among duplicates
        axes.sort_by_key(|&(index, _)| index);
        axes.dedup_by_key(|&mut (index, _)| index);

        let mut buttons: Vec<u8> = buttons.iter().copied().filter(|&b| b != mode_button).collect();
        buttons.sort_unstable();
        buttons.dedup();

        Self {
            axes,
            buttons,
            mode_button,
        }
    }

    /// Builds the table from the `[routing]` section.
    #[must_use]
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(
            &config.primary_axes,
            &config.auxiliary_axes,
            &config.buttons,
            config.mode_button,
        )
    }

    /// Class of an axis, `None` if it is not routed.
    #[must_use]
    pub fn class_of(&self, axis: u8) -> Option<AxisClass> {
        self.axes
            .binary_search_by_key(&axis, |&(index, _)| index)
            .ok()
            .map(|pos| self.axes[pos].1)
    }

    /// All routed axes in output order.
    pub fn axes(&self) -> &[(u8, AxisClass)] {
        &self.axes
    }

    /// Primary axes in output order.
    pub fn primary_axes(&self) -> impl Iterator<Item = u8> + '_ {
        self.axes
            .iter()
            .filter(|(_, class)| *class == AxisClass::Primary)
            .map(|(index, _)| *index)
    }

    /// Forwarded buttons in output order (mode button excluded).
    pub fn buttons(&self) -> &[u8] {
        &self.buttons
    }

    pub fn mode_button(&self) -> u8 {
        self.mode_button
    }

    /// Events in every frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.axes.len() + self.buttons.len()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}
