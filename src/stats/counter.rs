use crate::message::Message;

/// Running tally of completed messages.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counter {
    /// Messages acknowledged in time.
    pub successes: u64,
    /// Messages that failed or timed out.
    pub failures:  u64,
    /// Payload bytes of acknowledged messages.
    pub bytes:     u64,
}

impl Counter {
    /// Messages counted so far, whatever their outcome.
    pub fn completed(&self) -> u64 {
        self.successes + self.failures
    }
}

impl std::ops::AddAssign<&Message> for Counter {
    fn add_assign(&mut self, msg: &Message) {
        if msg.error {
            self.failures += 1;
        } else {
            self.successes += 1;
            self.bytes += msg.payload.len() as u64;
        }
    }
}
