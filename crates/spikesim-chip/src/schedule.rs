//! Global NoC message scheduler.
//!
//! Takes the per-source-core message queues a timestep produced and
//! serializes them into one causally consistent timeline: every message
//! gets its `sent`, `received` and `processed` timestamps, and the
//! maximum timestamp is the timestep's total latency.
//!
//! The scheduler drives a min-heap keyed by send time, holding at most
//! one pending message per source core so per-core order is preserved.
//! Congestion is modeled with a per-link *density* estimate: a message in
//! flight spreads one unit of occupancy evenly over the `hops + 2` links
//! of its XY route. When the summed density along a route exceeds the
//! path's buffering capacity, the sender stalls for the excess times the
//! rolling mean receive delay of everything currently in flight —
//! back-pressure without simulating individual flits.
//!
//! Placeholders take the same path through the heap (they advance their
//! core's send clock) but never enter the NoC.

use std::collections::{BinaryHeap, VecDeque};

use spikesim_noc::{MeshGeometry, MeshLocation, Route};

use crate::message::Message;

/// Scheduler configuration, handed over by the timestep driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    /// Mesh width in tiles.
    pub noc_width: usize,
    /// Mesh height in tiles.
    pub noc_height: usize,
    /// Total core slots (length of the per-core queue vector).
    pub core_count: usize,
    /// Core slots per tile.
    pub max_cores_per_tile: usize,
    /// Per-link buffer capacity in messages.
    pub buffer_size: usize,
}

/// Tolerance for floating-point drift when densities are decremented.
const DENSITY_EPSILON: f64 = 1e-6;

/// `(source core, index into its queue)`.
type MessageId = (usize, usize);

#[derive(Debug)]
struct HeapEntry {
    sent_timestamp: f64,
    sequence: u64,
    id: MessageId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// Inverted so `BinaryHeap` pops the earliest send time; ties go to
    /// the earlier insertion.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .sent_timestamp
            .total_cmp(&self.sent_timestamp)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Tracked NoC state: link occupancy and per-destination backlog.
#[derive(Debug)]
struct NocState {
    geometry: MeshGeometry,
    message_density: Vec<f64>,
    mean_in_flight_receive_delay: f64,
    messages_in_noc: usize,
    /// In-flight messages per destination core, in arrival order.
    messages_received: Vec<VecDeque<MessageId>>,
    /// Earliest time each core's receive hardware is idle again.
    core_finished_receiving: Vec<f64>,
}

impl NocState {
    fn new(geometry: MeshGeometry, core_count: usize) -> Self {
        Self {
            geometry,
            message_density: vec![0.0; geometry.link_count()],
            mean_in_flight_receive_delay: 0.0,
            messages_in_noc: 0,
            messages_received: (0..core_count).map(|_| VecDeque::new()).collect(),
            core_finished_receiving: vec![0.0; core_count],
        }
    }

    fn route(&self, m: &Message) -> Route {
        self.geometry.route(
            MeshLocation { x: m.src.x, y: m.src.y, core_offset: m.src.core_offset },
            MeshLocation { x: m.dest.x, y: m.dest.y, core_offset: m.dest.core_offset },
        )
    }

    /// Summed link density along the message's route.
    fn route_density(&self, m: &Message) -> f64 {
        let density: f64 = self.route(m).map(|link| self.message_density[link]).sum();
        assert!(density >= -DENSITY_EPSILON, "link density went negative: {density}");
        density
    }

    /// Account one message entering the NoC: spread its occupancy over
    /// the route and fold its receive delay into the rolling mean.
    fn add_message(&mut self, m: &Message) {
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (m.hops as f64 + 2.0);
        for link in self.route(m) {
            self.message_density[link] += contribution;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.mean_in_flight_receive_delay += (m.receive_delay
                - self.mean_in_flight_receive_delay)
                / (self.messages_in_noc as f64 + 1.0);
        }
        self.messages_in_noc += 1;
    }

    /// Reverse of [`NocState::add_message`], applied when a message has
    /// been fully received.
    fn remove_message(&mut self, m: &Message) {
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (m.hops as f64 + 2.0);
        for link in self.route(m) {
            self.message_density[link] -= contribution;
            debug_assert!(self.message_density[link] >= -DENSITY_EPSILON);
        }
        if self.messages_in_noc > 1 {
            #[allow(clippy::cast_precision_loss)]
            {
                self.mean_in_flight_receive_delay += (self.mean_in_flight_receive_delay
                    - m.receive_delay)
                    / (self.messages_in_noc as f64 - 1.0);
            }
        } else {
            self.mean_in_flight_receive_delay = 0.0;
        }
        self.messages_in_noc -= 1;
    }

    /// Drop every message whose reception completed by time `t` from the
    /// NoC, releasing its link occupancy.
    fn update(&mut self, t: f64, messages: &mut [Vec<Message>]) {
        for core in 0..self.messages_received.len() {
            let mut i = 0;
            while i < self.messages_received[core].len() {
                let (src, index) = self.messages_received[core][i];
                let departed = {
                    let m = &messages[src][index];
                    m.in_noc && t >= m.received_timestamp
                };
                if departed {
                    messages[src][index].in_noc = false;
                    self.remove_message(&messages[src][index]);
                    self.messages_received[core].remove(i);
                } else {
                    i += 1;
                }
            }
        }
    }
}

/// Schedule the global order of one timestep's messages.
///
/// `messages` holds one ordered queue per source core. On return every
/// message has its timestamps assigned; the returned value is the
/// timestamp of the last event, i.e. the total timestep latency.
///
/// # Panics
///
/// Panics when tracked link density goes negative beyond floating-point
/// tolerance — an internal invariant, not a user error.
#[must_use]
pub fn schedule_messages(messages: &mut [Vec<Message>], scheduler: &Scheduler) -> f64 {
    let geometry =
        MeshGeometry::new(scheduler.noc_width, scheduler.noc_height, scheduler.max_cores_per_tile);
    let mut noc = NocState::new(geometry, scheduler.core_count);
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut cursors = vec![0_usize; messages.len()];
    let mut sequence = 0_u64;
    let mut last_timestamp = 0.0_f64;

    // Seed the heap with each core's first message.
    for (core, queue) in messages.iter_mut().enumerate() {
        if let Some(first) = queue.first_mut() {
            first.sent_timestamp = first.generation_delay;
            heap.push(HeapEntry { sent_timestamp: first.sent_timestamp, sequence, id: (core, 0) });
            sequence += 1;
            cursors[core] = 1;
        }
    }

    while let Some(entry) = heap.pop() {
        let (core, index) = entry.id;
        last_timestamp = last_timestamp.max(entry.sent_timestamp);

        // Let everything that has already been received leave the NoC.
        noc.update(entry.sent_timestamp, messages);

        if !messages[core][index].placeholder {
            let route_density = noc.route_density(&messages[core][index]);
            let hops = messages[core][index].hops;

            // Back-pressure: a saturated route delays the send by the
            // excess occupancy times the mean in-flight receive delay.
            #[allow(clippy::cast_precision_loss)]
            let path_capacity = (hops as f64 + 1.0) * scheduler.buffer_size as f64;
            if route_density > path_capacity {
                let penalty =
                    (route_density - path_capacity) * noc.mean_in_flight_receive_delay;
                let m = &mut messages[core][index];
                m.sent_timestamp += penalty;
                m.blocked_delay += penalty;
            }

            let dest_core = messages[core][index].dest.core_id;
            messages[core][index].in_noc = true;
            noc.messages_received[dest_core].push_back((core, index));
            noc.add_message(&messages[core][index]);

            // Effective network delay under the current congestion,
            // against which the static route latency is a floor.
            #[allow(clippy::cast_precision_loss)]
            let effective_network_delay =
                route_density * noc.mean_in_flight_receive_delay / (hops as f64 + 1.0);

            let (earliest_received, receive_delay) = {
                let m = &messages[core][index];
                (m.sent_timestamp + m.network_delay.max(effective_network_delay), m.receive_delay)
            };
            let finished = noc.core_finished_receiving[dest_core];
            let received = finished.max(earliest_received);
            let processed = (finished + receive_delay).max(earliest_received + receive_delay);
            noc.core_finished_receiving[dest_core] = processed;

            let m = &mut messages[core][index];
            m.received_timestamp = received;
            m.processed_timestamp = processed;
            last_timestamp = last_timestamp.max(processed);
        }

        // Chain the source core's next message behind this one.
        let next_index = cursors[core];
        if next_index < messages[core].len() {
            let prev_sent = messages[core][index].sent_timestamp;
            let next = &mut messages[core][next_index];
            next.sent_timestamp = prev_sent + next.generation_delay;
            last_timestamp = last_timestamp.max(next.sent_timestamp);
            heap.push(HeapEntry {
                sent_timestamp: next.sent_timestamp,
                sequence,
                id: (core, next_index),
            });
            sequence += 1;
            cursors[core] = next_index + 1;
        }
    }

    debug_assert_eq!(
        noc.messages_in_noc,
        messages.iter().flatten().filter(|m| m.in_noc).count(),
        "in-flight bookkeeping diverged from message state"
    );

    last_timestamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DestinationAddress, SourceAddress};

    fn scheduler(width: usize, height: usize, cores_per_tile: usize, buffer: usize) -> Scheduler {
        Scheduler {
            noc_width: width,
            noc_height: height,
            core_count: width * height * cores_per_tile,
            max_cores_per_tile: cores_per_tile,
            buffer_size: buffer,
        }
    }

    /// A spike from core `(sx,0)` offset 0 to core `(dx,0)` offset 0 on a
    /// 1-row mesh with one core per tile.
    fn spike(sx: usize, dx: usize, generation: f64, network: f64, receive: f64) -> Message {
        let src = SourceAddress { x: sx, y: 0, tile_id: sx, core_id: sx, core_offset: 0 };
        let dest = DestinationAddress {
            x: dx,
            y: 0,
            tile_id: dx,
            core_id: dx,
            core_offset: 0,
            axon_id: 0,
        };
        let mut m = Message::spike("g".into(), 0, src, dest, 1, 1);
        m.generation_delay = generation;
        m.network_delay = network;
        m.receive_delay = receive;
        m.hops = sx.abs_diff(dx);
        m
    }

    #[test]
    fn empty_schedule_is_zero() {
        let s = scheduler(2, 1, 1, 1);
        let mut messages: Vec<Vec<Message>> = vec![Vec::new(), Vec::new()];
        assert_eq!(schedule_messages(&mut messages, &s), 0.0);
    }

    #[test]
    fn single_message_timestamps() {
        let s = scheduler(2, 1, 1, 1);
        let mut messages = vec![vec![spike(0, 1, 1.0, 0.5, 2.0)], Vec::new()];
        let total = schedule_messages(&mut messages, &s);

        let m = &messages[0][0];
        assert_eq!(m.sent_timestamp, 1.0);
        assert_eq!(m.received_timestamp, 1.5);
        assert_eq!(m.processed_timestamp, 3.5);
        assert_eq!(total, 3.5);
        assert_eq!(m.blocked_delay, 0.0);
    }

    #[test]
    fn per_core_messages_send_back_to_back() {
        let s = scheduler(2, 1, 1, 8);
        let mut messages =
            vec![vec![spike(0, 1, 1.0, 0.0, 1.0), spike(0, 1, 0.5, 0.0, 1.0)], Vec::new()];
        let total = schedule_messages(&mut messages, &s);

        // Second message is sent one generation delay after the first.
        assert_eq!(messages[0][0].sent_timestamp, 1.0);
        assert_eq!(messages[0][1].sent_timestamp, 1.5);
        // The destination serializes reception: 1.0..2.0, then 2.0..3.0.
        assert_eq!(messages[0][0].processed_timestamp, 2.0);
        assert_eq!(messages[0][1].processed_timestamp, 3.0);
        assert_eq!(total, 3.0);
    }

    #[test]
    fn heap_ties_break_by_insertion_order() {
        let s = scheduler(3, 1, 1, 8);
        // Cores 0 and 1 each send one message at the same instant to
        // core 2; core 0 was seeded first so it is received first.
        let mut messages =
            vec![vec![spike(0, 2, 1.0, 0.0, 1.0)], vec![spike(1, 2, 1.0, 0.0, 1.0)], Vec::new()];
        schedule_messages(&mut messages, &s);
        assert!(messages[0][0].received_timestamp <= messages[1][0].received_timestamp);
        assert_eq!(messages[0][0].processed_timestamp, 2.0);
        assert_eq!(messages[1][0].processed_timestamp, 3.0);
    }

    #[test]
    fn placeholders_only_advance_the_clock() {
        let s = scheduler(2, 1, 1, 1);
        let src = SourceAddress { x: 0, y: 0, tile_id: 0, core_id: 0, core_offset: 0 };
        let mut messages =
            vec![vec![Message::placeholder("g".into(), 0, src, 1, 2.5)], Vec::new()];
        let total = schedule_messages(&mut messages, &s);
        assert_eq!(total, 2.5);
        let m = &messages[0][0];
        assert!(!m.in_noc);
        assert!(m.received_timestamp.is_infinite());
    }

    /// One same-tile message from core `offset` to core 0 on a 1×1 mesh.
    fn local_spike(offset: usize, generation: f64) -> Message {
        let src = SourceAddress { x: 0, y: 0, tile_id: 0, core_id: offset, core_offset: offset };
        let dest =
            DestinationAddress { x: 0, y: 0, tile_id: 0, core_id: 0, core_offset: 0, axon_id: 0 };
        let mut m = Message::spike("g".into(), offset, src, dest, 1, 1);
        m.generation_delay = generation;
        m.network_delay = 10e-9;
        m.receive_delay = 50e-9;
        m.hops = 0;
        m
    }

    #[test]
    fn saturated_route_applies_back_pressure() {
        // Four senders on one tile target the same core with
        // single-message link buffers. A same-tile route has capacity
        // (hops+1)*buffer = 1, and every in-flight message puts 1/2 on
        // the shared destination in-link, so the fourth sender sees
        // density 1.5 and stalls.
        let s = scheduler(1, 1, 5, 1);
        let mut messages: Vec<Vec<Message>> = vec![Vec::new(); 5];
        for offset in 1..=4 {
            messages[offset].push(local_spike(offset, offset as f64 * 1e-10));
        }
        schedule_messages(&mut messages, &s);

        assert_eq!(messages[1][0].blocked_delay, 0.0);
        assert_eq!(messages[2][0].blocked_delay, 0.0);
        assert_eq!(messages[3][0].blocked_delay, 0.0);
        let last = &messages[4][0];
        assert!(
            last.blocked_delay > 0.0,
            "expected back-pressure on the fourth message, got {last:?}"
        );
        assert!(last.sent_timestamp > last.generation_delay);
    }

    #[test]
    fn congestion_below_capacity_leaves_sends_alone() {
        // Same traffic with room for two messages per link: density
        // along any route stays at or below capacity and nothing stalls.
        let s = scheduler(1, 1, 5, 2);
        let mut messages: Vec<Vec<Message>> = vec![Vec::new(); 5];
        for offset in 1..=4 {
            messages[offset].push(local_spike(offset, offset as f64 * 1e-10));
        }
        schedule_messages(&mut messages, &s);
        for queue in &messages {
            for m in queue {
                assert_eq!(m.blocked_delay, 0.0);
                assert_eq!(m.sent_timestamp, m.generation_delay);
            }
        }
    }

    #[test]
    fn timestamps_are_ordered() {
        let s = scheduler(4, 2, 2, 2);
        let mut messages: Vec<Vec<Message>> = vec![Vec::new(); 16];
        // A pseudo-random-ish traffic pattern over the mesh.
        for core in 0..4_usize {
            for k in 0..3_usize {
                let src =
                    SourceAddress { x: core, y: 0, tile_id: core * 2, core_id: core * 4, core_offset: 0 };
                let dest_x = (core + k + 1) % 4;
                let dest = DestinationAddress {
                    x: dest_x,
                    y: 1,
                    tile_id: dest_x * 2 + 1,
                    core_id: dest_x * 4 + 3,
                    core_offset: 1,
                    axon_id: 0,
                };
                let mut m = Message::spike("g".into(), k, src, dest, 1, 1);
                m.generation_delay = 1e-9 * (k as f64 + 1.0);
                m.network_delay = 2e-9;
                m.receive_delay = 7e-9;
                m.hops = core.abs_diff(dest_x) + 1;
                messages[core * 4].push(m);
            }
        }
        let total = schedule_messages(&mut messages, &s);

        let mut max_processed = 0.0_f64;
        for queue in &messages {
            for m in queue {
                assert!(m.sent_timestamp >= m.generation_delay);
                assert!(m.received_timestamp >= m.sent_timestamp);
                assert!(m.processed_timestamp >= m.received_timestamp);
                max_processed = max_processed.max(m.processed_timestamp);
            }
        }
        assert_eq!(total, max_processed);
    }
}
