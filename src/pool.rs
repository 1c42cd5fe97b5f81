//! Fixed-size connection pool, LIFO free-list allocator, and the per-slot
//! state machine.
//!
//! `peer` is a `(index, generation)` pair rather than a pointer or owning
//! reference: a slot's generation bumps every time it's freed, so a stale
//! peer reference left over from a reused slot reads as "no peer" instead of
//! dereferencing into the wrong connection.

use std::time::Instant;

/// A non-owning reference to another slot, validated against that slot's
/// generation at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub index: u32,
    pub generation: u32,
}

/// Which side of the client/upstream pair a slot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Upstream,
}

/// One connection's place in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// In the free list, not in use.
    Free,
    /// Upstream socket issued an async connect, awaiting writability.
    Connecting,
    /// Stream mode: general bidirectional forwarding.
    Connected,
    /// HTTP-mode client framing a new request.
    ReadingRequest,
    /// HTTP-mode client whose request is fully framed, awaiting dispatch.
    RequestComplete,
    /// HTTP-mode client whose upstream response is being relayed back.
    WritingResponse,
    /// Reserved for future half-close handling.
    Closing,
}

/// Per-request HTTP bookkeeping attached to a client slot in HTTP mode.
///
/// Only `is_complete`/`keep_alive`/`total_length` survive parsing here —
/// `method`/`path`/`host`/`headers` are borrowed from the read buffer by the
/// framer and only live for the duration of a single `parse()` call, so the
/// slot instead remembers just what dispatch needs once that borrow ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpState {
    pub is_complete: bool,
    pub keep_alive: bool,
    pub total_length: usize,
}

impl HttpState {
    pub fn reset(&mut self) {
        *self = HttpState::default();
    }
}

/// One slot in the pool: an fd, its buffers, its peer, and its place in the
/// state machine.
pub struct Slot {
    pub fd: i32,
    /// The registered socket itself. `None` only while `Free`. Kept
    /// alongside `fd` (used for `getsockopt(SO_ERROR)` and logging) because
    /// `mio`'s `Poll` registration is keyed on the `mio::event::Source`
    /// value, not the raw fd.
    pub stream: Option<mio::net::TcpStream>,
    pub generation: u32,
    pub peer: Option<SlotRef>,
    pub state: State,
    pub read_buf: crate::buffer::Buffer,
    pub write_buf: crate::buffer::Buffer,
    pub role: Role,
    pub last_active: Instant,
    pub http: HttpState,
    pub requests_handled: usize,
    pub keep_alive: bool,
}

impl Slot {
    fn new(buffer_capacity: usize) -> Self {
        Slot {
            fd: -1,
            stream: None,
            generation: 0,
            peer: None,
            state: State::Free,
            read_buf: crate::buffer::Buffer::with_capacity(buffer_capacity),
            write_buf: crate::buffer::Buffer::with_capacity(buffer_capacity),
            role: Role::Client,
            last_active: Instant::now(),
            http: HttpState::default(),
            requests_handled: 0,
            keep_alive: false,
        }
    }

    /// True for states the event loop still considers "live".
    pub fn is_live(&self) -> bool {
        self.state != State::Free
    }
}

/// Fixed-size array of slots plus a LIFO free list.
pub struct Pool {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
}

impl Pool {
    pub fn new(capacity: usize, buffer_capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::new(buffer_capacity)).collect();
        // Built in reverse so popping yields ascending indices first
        // (cosmetic only — doesn't affect correctness).
        let free_list = (0..capacity as u32).rev().collect();
        Pool { slots, free_list }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Pops a slot from the free list in O(1). `None` means pool exhaustion.
    pub fn alloc(&mut self) -> Option<u32> {
        let index = self.free_list.pop()?;
        let slot = &self.slots[index as usize];
        debug_assert_eq!(slot.state, State::Free, "allocated a non-free slot");
        Some(index)
    }

    /// Returns a slot to the free list, bumping its generation so existing
    /// `SlotRef`s to it go stale. Unpairs first.
    pub fn free(&mut self, index: u32) {
        self.unpair(index);
        let slot = &mut self.slots[index as usize];
        debug_assert_ne!(slot.state, State::Free, "double free of slot {index}");
        slot.fd = -1;
        slot.stream = None;
        slot.state = State::Free;
        slot.generation = slot.generation.wrapping_add(1);
        slot.peer = None;
        slot.read_buf = crate::buffer::Buffer::with_capacity(slot.read_buf.capacity());
        slot.write_buf = crate::buffer::Buffer::with_capacity(slot.write_buf.capacity());
        slot.http.reset();
        slot.requests_handled = 0;
        slot.keep_alive = false;
        self.free_list.push(index);
    }

    pub fn get(&self, index: u32) -> &Slot {
        &self.slots[index as usize]
    }

    pub fn get_mut(&mut self, index: u32) -> &mut Slot {
        &mut self.slots[index as usize]
    }

    pub fn slot_ref(&self, index: u32) -> SlotRef {
        SlotRef { index, generation: self.slots[index as usize].generation }
    }

    /// Resolves a peer reference, returning `None` if the generation is
    /// stale — the referenced slot was freed and possibly reused.
    pub fn resolve(&self, slot_ref: SlotRef) -> Option<u32> {
        let slot = self.slots.get(slot_ref.index as usize)?;
        if slot.generation == slot_ref.generation && slot.is_live() {
            Some(slot_ref.index)
        } else {
            None
        }
    }

    /// Sets both ends of the symmetric peer relation.
    pub fn pair(&mut self, a: u32, b: u32) {
        let a_ref = self.slot_ref(a);
        let b_ref = self.slot_ref(b);
        self.slots[a as usize].peer = Some(b_ref);
        self.slots[b as usize].peer = Some(a_ref);
    }

    /// Clears both ends of the link if present. Idempotent.
    pub fn unpair(&mut self, index: u32) {
        let peer = self.slots[index as usize].peer.take();
        if let Some(peer_ref) = peer {
            if let Some(peer_index) = self.resolve(peer_ref) {
                self.slots[peer_index as usize].peer = None;
            }
        }
    }

    /// Resolves a slot's live peer index, if any.
    pub fn peer_of(&self, index: u32) -> Option<u32> {
        self.resolve(self.slots[index as usize].peer?)
    }

    /// Borrows two distinct slots mutably at once, needed to copy bytes
    /// directly from one slot's read buffer into another's write buffer.
    pub fn get_two_mut(&mut self, a: u32, b: u32) -> (&mut Slot, &mut Slot) {
        assert_ne!(a, b, "get_two_mut requires distinct indices");
        if a < b {
            let (left, right) = self.slots.split_at_mut(b as usize);
            (&mut left[a as usize], &mut right[0])
        } else {
            let (left, right) = self.slots.split_at_mut(a as usize);
            (&mut right[0], &mut left[b as usize])
        }
    }

    pub fn iter_live(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_live())
            .map(|(i, _)| i as u32)
    }
}

/// Pure, side-effect-free state-machine predicates.
pub mod predicates {
    use super::{Pool, Role, State};

    /// True when the slot should be registered for readable interest: it's
    /// in a read-capable state, has a peer, and that peer's write buffer
    /// isn't full.
    pub fn wants_read(pool: &Pool, index: u32) -> bool {
        let slot = pool.get(index);
        let read_capable = match slot.state {
            State::Connected | State::ReadingRequest => true,
            State::WritingResponse => slot.role == Role::Upstream,
            _ => false,
        };
        if !read_capable {
            return false;
        }
        match pool.peer_of(index) {
            Some(peer) => !pool.get(peer).write_buf.is_full(),
            None => false,
        }
    }

    /// True when the slot should be registered for writable interest:
    /// either it's mid-connect, or it has buffered bytes to drain.
    pub fn wants_write(pool: &Pool, index: u32) -> bool {
        let slot = pool.get(index);
        slot.state == State::Connecting || !slot.write_buf.is_empty()
    }

    pub fn can_read(pool: &Pool, index: u32) -> bool {
        pool.get(index).is_live() && wants_read(pool, index)
    }

    pub fn can_write(pool: &Pool, index: u32) -> bool {
        let slot = pool.get(index);
        slot.is_live() && slot.state != State::Connecting && !slot.write_buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_pops_lifo() {
        let mut pool = Pool::new(3, 64);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.active_count(), 0); // still Free: alloc doesn't set state
        pool.get_mut(a).state = State::Connected;
        pool.get_mut(b).state = State::Connected;
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn exhaustion_returns_none_never_evicts() {
        let mut pool = Pool::new(2, 64);
        let a = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connected;
        let b = pool.alloc().unwrap();
        pool.get_mut(b).state = State::Connected;
        assert!(pool.alloc().is_none());
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn free_then_realloc_reuses_index_bumps_generation() {
        let mut pool = Pool::new(2, 64);
        let a = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connected;
        let gen0 = pool.slot_ref(a).generation;
        pool.free(a);
        let a2 = pool.alloc().unwrap();
        assert_eq!(a, a2);
        assert_ne!(pool.slot_ref(a2).generation, gen0);
    }

    #[test]
    fn pair_is_symmetric_and_unpair_clears_both() {
        let mut pool = Pool::new(2, 64);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connected;
        pool.get_mut(b).state = State::Connected;
        pool.pair(a, b);
        assert_eq!(pool.peer_of(a), Some(b));
        assert_eq!(pool.peer_of(b), Some(a));
        pool.unpair(a);
        assert_eq!(pool.peer_of(a), None);
        assert_eq!(pool.peer_of(b), None);
    }

    #[test]
    fn stale_peer_ref_resolves_to_none_after_reuse() {
        let mut pool = Pool::new(2, 64);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connected;
        pool.get_mut(b).state = State::Connected;
        pool.pair(a, b);
        let stale = pool.slot_ref(b);
        pool.free(b);
        assert_eq!(pool.resolve(stale), None);
        // `a`'s peer link was cleared by `free`'s `unpair`, not left dangling.
        assert_eq!(pool.peer_of(a), None);
    }

    #[test]
    fn wants_read_false_when_peer_write_buf_full() {
        let mut pool = Pool::new(2, 4);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connected;
        pool.get_mut(b).state = State::Connected;
        pool.pair(a, b);
        assert!(predicates::wants_read(&pool, a));
        pool.get_mut(b).write_buf.append(b"xxxx"); // fills 4-byte capacity
        assert!(!predicates::wants_read(&pool, a));
    }

    #[test]
    fn wants_write_true_while_connecting_even_with_empty_buffer() {
        let mut pool = Pool::new(1, 64);
        let a = pool.alloc().unwrap();
        pool.get_mut(a).state = State::Connecting;
        assert!(predicates::wants_write(&pool, a));
    }
}
