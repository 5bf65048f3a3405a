//! Lock free exchange of learned facts between workers.
//!
//! Every worker exposes a single slot mailbox. A sender accumulates units,
//! binary clauses, long clause handles and detach notifications in one
//! outbound message per receiver and publishes it with a compare-and-swap of
//! the receiver's slot. A failed publication is silent; the outbound message
//! keeps accumulating and the send is retried on the next main loop
//! iteration, so sharing is lossy in time but never in content.
//!
//! Publication uses release ordering and consumption acquire ordering, which
//! makes a received message a consistent snapshot of the sender's shared
//! state. In particular the payload of every shared clause handle is fully
//! written before the handle becomes visible to the receiver.
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use partial_ref::{partial, PartialRef};

use parsat_formula::Lit;

use crate::clause::Clause;
use crate::context::{ClauseAllocP, Context, MessagesP, SharedStateP, StatsP};

/// Learned artifacts exchanged between a pair of workers.
#[derive(Default)]
pub struct Message {
    pub units: Vec<Lit>,
    pub binaries: Vec<[Lit; 2]>,
    pub clauses: Vec<Clause>,
    /// Indices of the receiver's clauses that the sender detached.
    pub detached: Vec<u32>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
            && self.binaries.is_empty()
            && self.clauses.is_empty()
            && self.detached.is_empty()
    }
}

/// Single slot mailbox holding at most one pending message.
pub struct Mailbox {
    slot: AtomicPtr<Message>,
}

impl Default for Mailbox {
    fn default() -> Mailbox {
        Mailbox {
            slot: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl Mailbox {
    /// Publish a message if the slot is empty.
    ///
    /// On failure the message is handed back to the caller for a later
    /// retry.
    pub fn post(&self, message: Box<Message>) -> Result<(), Box<Message>> {
        let raw = Box::into_raw(message);
        match self
            .slot
            .compare_exchange(ptr::null_mut(), raw, Ordering::Release, Ordering::Relaxed)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(unsafe { Box::from_raw(raw) }),
        }
    }

    /// Consume the pending message, if any.
    pub fn take(&self) -> Option<Box<Message>> {
        let raw = self.slot.swap(ptr::null_mut(), Ordering::Acquire);
        if raw.is_null() {
            None
        } else {
            Some(unsafe { Box::from_raw(raw) })
        }
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.take();
    }
}

/// Worker local messaging state.
///
/// Holds the accumulating outbound message per peer and the buffered inbound
/// artifacts, which are integrated at the next restart boundary.
pub struct Messages {
    id: usize,
    outboxes: Vec<Box<Message>>,
    pub(crate) pending_units: Vec<Lit>,
    pub(crate) pending_binaries: Vec<[Lit; 2]>,
    pub(crate) pending_clauses: Vec<Clause>,
}

impl Default for Messages {
    fn default() -> Messages {
        Messages {
            id: 0,
            outboxes: vec![],
            pending_units: vec![],
            pending_binaries: vec![],
            pending_clauses: vec![],
        }
    }
}

impl Messages {
    /// Set up the outbound messages for a worker group.
    pub fn init(&mut self, id: usize, nr_workers: usize) {
        self.id = id;
        self.outboxes = (0..nr_workers).map(|_| Box::default()).collect();
    }

    /// This worker's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of workers in the group, including this one.
    pub fn nr_workers(&self) -> usize {
        self.outboxes.len().max(1)
    }

    /// Queue a learned unit for every peer.
    pub fn share_unit(&mut self, lit: Lit) {
        let id = self.id;
        for (peer, outbox) in self.outboxes.iter_mut().enumerate() {
            if peer != id {
                outbox.units.push(lit);
            }
        }
    }

    /// Queue a learned binary clause for every peer.
    pub fn share_binary(&mut self, lits: [Lit; 2]) {
        let id = self.id;
        for (peer, outbox) in self.outboxes.iter_mut().enumerate() {
            if peer != id {
                outbox.binaries.push(lits);
            }
        }
    }

    /// Queue a learned long clause handle for every peer.
    ///
    /// The clause must have been allocated with a reference for every peer.
    pub fn share_clause(&mut self, clause: Clause) {
        let id = self.id;
        debug_assert_eq!(clause.owner(), id);
        for (peer, outbox) in self.outboxes.iter_mut().enumerate() {
            if peer != id {
                outbox.clauses.push(clause);
            }
        }
    }

    /// Queue a detach notification towards the owner of a clause.
    pub fn notify_detach(&mut self, owner: usize, index: u32) {
        debug_assert_ne!(owner, self.id);
        self.outboxes[owner].detached.push(index);
    }
}

/// Try to publish every non-empty outbound message.
///
/// A successful publication replaces the outbox with a fresh message; on
/// failure the accumulated message is kept for the next attempt.
pub fn flush_outgoing(mut ctx: partial!(Context, mut MessagesP, SharedStateP)) {
    let (messages, ctx) = ctx.split_part_mut(MessagesP);
    let shared = ctx.part(SharedStateP);

    for peer in 0..messages.outboxes.len() {
        if peer == messages.id || messages.outboxes[peer].is_empty() {
            continue;
        }

        let message = mem::take(&mut messages.outboxes[peer]);
        if let Err(message) = shared.mailbox(peer).post(message) {
            messages.outboxes[peer] = message;
        }
    }
}

/// Drain this worker's mailbox.
///
/// Units, binaries and clauses are buffered until the next restart boundary;
/// detach notifications drop references immediately, as only the owner ever
/// does so.
pub fn receive_messages(
    mut ctx: partial!(Context, mut ClauseAllocP, mut MessagesP, mut StatsP, SharedStateP),
) {
    let (shared, mut ctx) = ctx.split_part(SharedStateP);
    let (messages, mut ctx) = ctx.split_part_mut(MessagesP);

    if let Some(message) = shared.mailbox(messages.id).take() {
        let stats = ctx.part_mut(StatsP);
        stats.units_received += message.units.len() as u64;
        stats.binaries_received += message.binaries.len() as u64;
        stats.clauses_received += message.clauses.len() as u64;

        messages.pending_units.extend_from_slice(&message.units);
        messages
            .pending_binaries
            .extend_from_slice(&message.binaries);
        messages.pending_clauses.extend_from_slice(&message.clauses);

        let alloc = ctx.part_mut(ClauseAllocP);
        for &index in message.detached.iter() {
            alloc.free(index);
        }
    }
}
