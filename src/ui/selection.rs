use std::collections::{HashSet, VecDeque};

use crate::overlay::controller::ControllerEvent;

/// Checkbox state for the criteria panel.
///
/// The worker answers every event in order, with either a refreshed legend
/// panel or a rejection. Events it has not answered yet are replayed on top
/// of the last confirmed panel, so a box ticked while an earlier toggle is in
/// flight stays ticked.
#[derive(Debug, Default)]
pub struct LayerSelection {
    confirmed: Vec<String>,
    in_flight: VecDeque<ControllerEvent>,
    checked: HashSet<String>,
}

impl LayerSelection {
    pub fn is_checked(&self, id: &str) -> bool {
        self.checked.contains(id)
    }

    /// Records an event that was handed to the worker.
    pub fn request(&mut self, event: ControllerEvent) {
        self.in_flight.push_back(event);
        self.refresh();
    }

    /// The worker finished the oldest event and published `ids` as active.
    pub fn confirm<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        self.in_flight.pop_front();
        self.confirmed = ids.into_iter().map(str::to_string).collect();
        self.refresh();
    }

    /// The worker rejected the oldest event.
    pub fn reject(&mut self) {
        self.in_flight.pop_front();
        self.refresh();
    }

    fn refresh(&mut self) {
        self.checked = self.confirmed.iter().cloned().collect();
        for event in &self.in_flight {
            match event {
                ControllerEvent::Toggle { id, on: true } => {
                    self.checked.insert(id.clone());
                }
                ControllerEvent::Toggle { id, on: false } => {
                    self.checked.remove(id);
                }
                ControllerEvent::Clear => self.checked.clear(),
            }
        }
    }
}
