//! Parameter tree of the simulated device.

use crate::protocol::{datatype, ParamDescriptor, ParamUpdate};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Ids of the demo tree built by [`ParamStore::demo`].
pub mod demo {
    pub const OSCILLATOR: i32 = 1;
    pub const FREQUENCY: i32 = 2;
    pub const WAVEFORM: i32 = 3;
    pub const MUTE: i32 = 4;
    pub const GAIN: i32 = 5;
    pub const RESET: i32 = 6;
    pub const STATUS: i32 = 7;
    pub const BROKEN: i32 = 8;
    pub const COLOR: i32 = 9;
}

/// Descriptors kept in insertion order, which is always parents-first.
#[derive(Default)]
pub struct ParamStore {
    params: Vec<ParamDescriptor>,
    defaults: HashMap<i32, Option<Value>>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn demo() -> Self {
        let mut store = Self::new();

        let mut osc = ParamDescriptor::new(demo::OSCILLATOR, datatype::GROUP);
        osc.label = Some("oscillator".into());
        store.insert(osc);

        let mut freq = ParamDescriptor::new(demo::FREQUENCY, datatype::FLOAT);
        freq.parent = Some(demo::OSCILLATOR);
        freq.label = Some("frequency".into());
        freq.description = Some("Hz".into());
        freq.value = Some(json!(440.0));
        freq.minimum = Some(20.0);
        freq.maximum = Some(20_000.0);
        store.insert(freq);

        let mut wave = ParamDescriptor::new(demo::WAVEFORM, datatype::STRING);
        wave.parent = Some(demo::OSCILLATOR);
        wave.label = Some("waveform".into());
        wave.value = Some(json!("sine"));
        store.insert(wave);

        let mut mute = ParamDescriptor::new(demo::MUTE, datatype::BOOLEAN);
        mute.parent = Some(demo::OSCILLATOR);
        mute.label = Some("mute".into());
        mute.value = Some(json!(false));
        store.insert(mute);

        let mut gain = ParamDescriptor::new(demo::GAIN, datatype::FLOAT);
        gain.label = Some("gain".into());
        gain.value = Some(json!(0.5));
        gain.minimum = Some(0.0);
        gain.maximum = Some(1.0);
        store.insert(gain);

        let mut reset = ParamDescriptor::new(demo::RESET, datatype::BANG);
        reset.label = Some("reset".into());
        store.insert(reset);

        let mut status = ParamDescriptor::new(demo::STATUS, datatype::STRING);
        status.label = Some("status".into());
        status.readonly = true;
        status.value = Some(json!("running"));
        store.insert(status);

        store.insert(ParamDescriptor::new(demo::BROKEN, datatype::INVALID));

        let mut color = ParamDescriptor::new(demo::COLOR, "rgba");
        color.label = Some("color".into());
        store.insert(color);

        store
    }

    pub fn get(&self, id: i32) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.id == id)
    }

    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Adds or replaces a descriptor. Its current value becomes the default
    /// restored by [`ParamStore::reset`].
    pub fn insert(&mut self, desc: ParamDescriptor) {
        self.defaults.insert(desc.id, desc.value.clone());
        match self.params.iter_mut().find(|p| p.id == desc.id) {
            Some(slot) => *slot = desc,
            None => self.params.push(desc),
        }
    }

    /// Removes a parameter and everything below it. Returns removed ids,
    /// the requested one first.
    pub fn remove(&mut self, id: i32) -> Vec<i32> {
        if self.get(id).is_none() {
            return Vec::new();
        }
        let mut removed = vec![id];
        let mut i = 0;
        while i < removed.len() {
            let parent = removed[i];
            removed.extend(
                self.params
                    .iter()
                    .filter(|p| p.parent == Some(parent))
                    .map(|p| p.id),
            );
            i += 1;
        }
        self.params.retain(|p| !removed.contains(&p.id));
        for id in &removed {
            self.defaults.remove(id);
        }
        removed
    }

    pub fn set_value(&mut self, id: i32, value: Value) -> bool {
        match self.params.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Restores default values; returns an update for each one that changed.
    pub fn reset(&mut self) -> Vec<ParamUpdate> {
        let mut updates = Vec::new();
        for p in &mut self.params {
            let Some(Some(default)) = self.defaults.get(&p.id) else {
                continue;
            };
            if p.value.as_ref() != Some(default) {
                p.value = Some(default.clone());
                updates.push(ParamUpdate::value(p.id, default.clone()));
            }
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_tree_is_parents_first() {
        let store = ParamStore::demo();
        for (i, p) in store.descriptors().iter().enumerate() {
            if let Some(parent) = p.parent {
                let parent_pos = store
                    .descriptors()
                    .iter()
                    .position(|q| q.id == parent)
                    .unwrap();
                assert!(parent_pos < i, "{} listed before its group", p.id);
            }
        }
    }

    #[test]
    fn remove_takes_the_subtree() {
        let mut store = ParamStore::demo();
        let removed = store.remove(demo::OSCILLATOR);
        assert_eq!(
            removed,
            vec![demo::OSCILLATOR, demo::FREQUENCY, demo::WAVEFORM, demo::MUTE]
        );
        assert!(store.get(demo::FREQUENCY).is_none());
        assert!(store.remove(demo::OSCILLATOR).is_empty());
    }

    #[test]
    fn reset_restores_changed_values_only() {
        let mut store = ParamStore::demo();
        store.set_value(demo::GAIN, json!(0.9));
        let updates = store.reset();
        assert_eq!(updates, vec![ParamUpdate::value(demo::GAIN, json!(0.5))]);
        assert!(store.reset().is_empty());
    }
}
