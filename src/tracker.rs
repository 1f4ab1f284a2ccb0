/// Keeps at most one segmentation request in flight.
///
/// Submissions made while a request is outstanding are not dropped: they are
/// folded into a single pending flag and replayed once the current response
/// arrives. `invalidate` bumps a generation counter so responses to requests
/// issued before a clear or an image change are ignored.
#[derive(Debug, Default)]
pub struct RequestTracker {
    generation: u64,
    next_id: u64,
    in_flight: Option<u64>,
    pending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// No `invalidate` happened since the request was issued, so the
    /// response may be shown.
    pub apply: bool,
    /// Annotations changed while waiting; submit again.
    pub resubmit: bool,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn try_begin(&mut self) -> Option<Ticket> {
        if self.in_flight.is_some() {
            self.pending = true;
            return None;
        }
        self.next_id += 1;
        self.in_flight = Some(self.next_id);
        self.pending = false;
        Some(Ticket {
            id: self.next_id,
            generation: self.generation,
        })
    }

    pub fn finish(&mut self, ticket: Ticket) -> Outcome {
        if self.in_flight != Some(ticket.id) {
            log::warn!("ignoring completion of unknown request #{}", ticket.id);
            return Outcome {
                apply: false,
                resubmit: false,
            };
        }
        self.in_flight = None;
        let resubmit = std::mem::take(&mut self.pending);
        Outcome {
            apply: ticket.generation == self.generation,
            resubmit,
        }
    }

    /// Anything in flight becomes stale, and a queued resubmission is dropped.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.pending = false;
    }
}
