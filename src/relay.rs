use crate::types::RelayMode;

/// Where a single inbound message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Targets {
    /// Nothing is delivered.
    None,

    /// Deliver to the output at this index.
    One(usize),

    /// Deliver to every output, in list order.
    All,
}

/// Relay policy of an actor.
///
/// Keeps the round-robin cursor next to the mode so that the cursor survives
/// mode changes, and is always a valid index into the current output list
/// (or zero when the list is empty).
#[derive(Debug, Clone, Default)]
pub(crate) struct Relay {
    mode: RelayMode,
    cursor: usize,
}

impl Relay {
    pub(crate) fn new(mode: RelayMode) -> Self {
        Self { mode, cursor: 0 }
    }

    pub(crate) fn set_mode(&mut self, mode: RelayMode) {
        self.mode = mode;
    }

    #[cfg(test)]
    fn cursor(&self) -> usize {
        self.cursor
    }

    /// Picks the targets for one inbound message given `outputs` outputs,
    /// advancing the round-robin cursor.
    pub(crate) fn route(&mut self, outputs: usize) -> Targets {
        if outputs == 0 {
            return Targets::None;
        }
        match self.mode {
            RelayMode::RoundRobin => {
                let i = self.cursor % outputs;
                self.cursor = (i + 1) % outputs;
                Targets::One(i)
            }
            RelayMode::Multicast => Targets::All,
            RelayMode::Discard => Targets::None,
        }
    }

    /// Keeps the cursor valid after the output at `removed` was deleted,
    /// leaving `remaining` outputs.
    pub(crate) fn output_removed(&mut self, removed: usize, remaining: usize) {
        if remaining == 0 {
            self.cursor = 0;
            return;
        }
        // The output that was next in line shifted down by one.
        if removed < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= remaining {
            self.cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles() {
        let mut relay = Relay::new(RelayMode::RoundRobin);
        let picks: Vec<_> = (0..7).map(|_| relay.route(3)).collect();
        assert_eq!(
            picks,
            vec![
                Targets::One(0),
                Targets::One(1),
                Targets::One(2),
                Targets::One(0),
                Targets::One(1),
                Targets::One(2),
                Targets::One(0),
            ]
        );
    }

    #[test]
    fn empty_outputs_route_nowhere() {
        for mode in [RelayMode::RoundRobin, RelayMode::Multicast, RelayMode::Discard] {
            let mut relay = Relay::new(mode);
            assert_eq!(relay.route(0), Targets::None);
            assert_eq!(relay.cursor(), 0);
        }
    }

    #[test]
    fn multicast_and_discard_leave_cursor_alone() {
        let mut relay = Relay::new(RelayMode::RoundRobin);
        relay.route(3);
        relay.set_mode(RelayMode::Multicast);
        assert_eq!(relay.route(3), Targets::All);
        relay.set_mode(RelayMode::Discard);
        assert_eq!(relay.route(3), Targets::None);
        assert_eq!(relay.cursor(), 1);
    }

    #[test]
    fn removal_keeps_cursor_on_next_output() {
        let mut relay = Relay::new(RelayMode::RoundRobin);
        relay.route(3);
        relay.route(3);
        assert_eq!(relay.cursor(), 2);

        // [a, b, c] -> [b, c], c is still next
        relay.output_removed(0, 2);
        assert_eq!(relay.route(2), Targets::One(1));
    }

    #[test]
    fn removal_of_last_output_wraps_cursor() {
        let mut relay = Relay::new(RelayMode::RoundRobin);
        relay.route(3);
        relay.route(3);
        relay.output_removed(2, 2);
        assert_eq!(relay.cursor(), 0);
        relay.output_removed(0, 0);
        assert_eq!(relay.cursor(), 0);
    }
}
