use common::payload::PollingData;
use std::collections::VecDeque;

/// Every payload received this session, oldest first. Never persisted.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<PollingData>,
    /// Keep at most this many entries; `None` keeps everything.
    max: Option<usize>,
}

impl History {
    pub fn new(max: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            max: max.filter(|n| *n > 0),
        }
    }

    pub fn push(&mut self, data: PollingData) {
        if let Some(max) = self.max {
            while self.entries.len() >= max {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(data);
    }

    pub fn latest(&self) -> Option<&PollingData> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PollingData> {
        self.entries.iter()
    }

    /// The most recent message, or the waiting banner.
    pub fn render_latest(&self) -> String {
        match self.latest() {
            Some(data) => format!(
                "The most recent message\n  Message: {}\n  Timestamp: {}",
                data.message, data.timestamp
            ),
            None => "Polling...".to_string(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Polling Reader\n");
        out.push_str(&self.render_latest());
        out.push_str("\n\nPolling History\n");
        for data in self.iter() {
            out.push_str(&format!(
                "  - Message: {}\n    Timestamp: {}\n",
                data.message, data.timestamp
            ));
        }
        out
    }
}
