use crate::error::HalError;
use crate::expander::GpioController;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps one logical output to a controller pin, with an optional wiring
/// inversion for active-low loads.
#[derive(Clone)]
pub struct PinMapping {
    pub controller: Arc<dyn GpioController>,
    pub pin: usize,
    pub invert: bool,
}

impl PinMapping {
    fn drive(&self, lit: bool) {
        self.controller.set(self.pin, lit != self.invert);
    }
}

/// A single on/off indicator.
pub struct Indicator {
    mapping: PinMapping,
}

impl Indicator {
    pub fn new(mapping: PinMapping) -> Self {
        Self { mapping }
    }

    pub fn set(&self, on: bool) {
        self.mapping.drive(on);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarMode {
    Bar,
    Dot,
}

/// An ordered bar of N outputs driven as a contiguous lit run: segment i
/// is lit iff i <= level. The LED rig is active-low, so a lit segment
/// drives its wire low and a dark segment high; the per-output invert
/// flag flips that for other wiring.
pub struct LevelBar {
    mappings: HashMap<usize, PinMapping>,
    segments: usize,
    mode: BarMode,
}

impl LevelBar {
    pub fn new(mappings: HashMap<usize, PinMapping>, mode: BarMode) -> Self {
        let segments = mappings.len();
        Self {
            mappings,
            segments,
            mode,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments
    }

    pub fn set(&self, level: usize) -> Result<(), HalError> {
        if level >= self.segments {
            return Err(HalError::LevelOutOfRange {
                level,
                segments: self.segments,
            });
        }
        if self.mode == BarMode::Dot {
            return Err(HalError::NotImplemented("dot display mode"));
        }

        // A missing mapping aborts mid-update: segments before it have
        // already been written.
        for i in 0..self.segments {
            let mapping = self
                .mappings
                .get(&i)
                .ok_or(HalError::MissingMapping { index: i })?;
            mapping.drive(i > level);
        }
        Ok(())
    }

    /// Darken every segment.
    pub fn clear(&self) -> Result<(), HalError> {
        for i in 0..self.segments {
            let mapping = self
                .mappings
                .get(&i)
                .ok_or(HalError::MissingMapping { index: i })?;
            mapping.drive(true);
        }
        Ok(())
    }
}
