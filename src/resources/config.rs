//! Key/value configuration tables (`Configs/*.cfg`).
//!
//! A config file is a sequence of `"KEY" "VALUE"` lines. The caller decides
//! which keys exist by supplying an ordered key list; parsed keys match the
//! list case-insensitively and values land in the matching slot. Unmatched
//! lines are ignored, which lets several subsystems share one file.

use crate::assets::{Asset, AssetIo, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::utils::text::{find_slot, quoted_pair};

/// Ordered key list defining the slots of a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigParams {
    pub keys: Vec<String>,
}

impl ConfigParams {
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Slot-indexed float settings. Slots never written hold NaN, the missing
/// marker; use [`Config::try_value`] to tell missing from present.
pub struct Config {
    keys: Vec<String>,
    values: Vec<f32>,
}

impl Config {
    fn apply_line(&mut self, line: &str) {
        if let Some((key, value)) = quoted_pair(line) {
            if let Some(slot) = find_slot(key, &self.keys) {
                self.values[slot] = value.parse().unwrap_or(0.0);
            }
        }
    }

    /// Serialized `"KEY" "VALUE"` lines, ascending slot order, missing slots
    /// skipped.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (slot, value) in self.values.iter().enumerate() {
            if !value.is_nan() {
                out.push_str(&format!("\"{}\" \"{}\"\n", self.keys[slot], value));
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // 访问器
    // ------------------------------------------------------------------

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Value in `slot`, NaN when the slot is missing or out of range.
    #[must_use]
    pub fn value(&self, slot: usize) -> f32 {
        self.values.get(slot).copied().unwrap_or(f32::NAN)
    }

    #[must_use]
    pub fn try_value(&self, slot: usize) -> Option<f32> {
        self.values
            .get(slot)
            .copied()
            .filter(|value| !value.is_nan())
    }

    pub fn set_value(&mut self, slot: usize, value: f32) {
        if let Some(entry) = self.values.get_mut(slot) {
            *entry = value;
        }
    }

    /// Writes the table back under its name.
    pub fn save(&self, io: &AssetIo, name: &str) -> Result<()> {
        io.write_text(AssetKind::Config, name, &self.render())
    }
}

impl Asset for Config {
    type Params = ConfigParams;
    const KIND: AssetKind = AssetKind::Config;

    fn new(params: &ConfigParams) -> Self {
        Self {
            keys: params.keys.clone(),
            values: vec![f32::NAN; params.keys.len()],
        }
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        // The hard-coded default is the empty table the constructor built.
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let text = ctx.io().read_text(Self::KIND, ctx.name())?;
        for line in text.lines() {
            self.apply_line(line);
        }
        Ok(())
    }
}

impl Handle<Config> {
    /// See [`Config::value`].
    #[must_use]
    pub fn value(&self, slot: usize) -> f32 {
        self.read().value(slot)
    }

    pub fn set_value(&self, slot: usize, value: f32) {
        self.write().set_value(slot, value);
    }

    /// Writes the table back to the file this handle was loaded from.
    pub fn save(&self, io: &AssetIo) -> Result<()> {
        self.read().save(io, self.name())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed() -> Config {
        Config::new(&ConfigParams::new(["WIDTH", "HEIGHT", "VSYNC"]))
    }

    #[test]
    fn lines_fill_matching_slots_case_insensitively() {
        let mut config = windowed();
        config.apply_line("\"width\" \"1920\"");
        config.apply_line("\"Height\" \"1080\"");
        config.apply_line("\"brightness\" \"0.5\"");
        config.apply_line("not a config line");
        assert_eq!(config.value(0), 1920.0);
        assert_eq!(config.value(1), 1080.0);
        assert!(config.value(2).is_nan(), "vsync was never given");
        assert_eq!(config.try_value(2), None);
    }

    #[test]
    fn garbage_values_parse_to_zero() {
        let mut config = windowed();
        config.apply_line("\"WIDTH\" \"very wide\"");
        assert_eq!(config.value(0), 0.0);
    }

    #[test]
    fn render_skips_missing_slots_in_slot_order() {
        let mut config = windowed();
        config.set_value(2, 1.0);
        config.set_value(0, 1280.0);
        assert_eq!(config.render(), "\"WIDTH\" \"1280\"\n\"VSYNC\" \"1\"\n");
    }

    #[test]
    fn out_of_range_slots_are_inert() {
        let mut config = windowed();
        config.set_value(9, 3.0);
        assert!(config.value(9).is_nan());
    }
}
