//! State shared by all workers of a solve.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use crate::messages::Mailbox;

/// The only state shared between workers: one mailbox per worker, the exit
/// flag and the external interrupt flag.
///
/// Everything else a worker touches is owned by that worker; the mailboxes
/// carry all cooperation.
pub struct Shared {
    mailboxes: Vec<Mailbox>,
    should_exit: AtomicBool,
    interrupt: Arc<AtomicBool>,
    /// Workers park here before tearing down their state, so no allocator is
    /// dropped while a peer could still read its clauses.
    shutdown: Barrier,
}

impl Shared {
    pub fn new(nr_workers: usize, interrupt: Arc<AtomicBool>) -> Shared {
        Shared {
            mailboxes: (0..nr_workers).map(|_| Mailbox::default()).collect(),
            should_exit: AtomicBool::new(false),
            interrupt,
            shutdown: Barrier::new(nr_workers),
        }
    }

    /// The inbox of the given worker.
    pub fn mailbox(&self, id: usize) -> &Mailbox {
        &self.mailboxes[id]
    }

    /// Ask every worker to wind down.
    pub fn request_exit(&self) {
        self.should_exit.store(true, Ordering::Relaxed);
    }

    /// Whether the solve should wind down, for whatever reason.
    pub fn exit_requested(&self) -> bool {
        self.should_exit.load(Ordering::Relaxed) || self.interrupt.load(Ordering::Relaxed)
    }

    /// Whether the external interrupt flag was raised.
    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Wait until every worker has stopped searching.
    pub fn wait_shutdown(&self) {
        self.shutdown.wait();
    }
}

impl Default for Shared {
    fn default() -> Shared {
        Shared::new(1, Arc::new(AtomicBool::new(false)))
    }
}
