//! Deferred deallocation for working pairs
//!
//! Working pairs are several megabytes of sample data. A lane replaces its
//! pair inside the audio callback, so the old one is wrapped in
//! `basedrop::Owned`: dropping it only enqueues the pointer, and a background
//! collector thread frees the memory.
//!
//! ```ignore
//! use basedrop::Owned;
//! use bytestep_core::engine::gc_handle;
//!
//! let pair = Owned::new(&gc_handle(), working_pair);
//! producer.push(EngineCommand::LoadPair { lane: 0, pair })?;
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// How often the collector thread reclaims queued drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("bytestep-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Buffer GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn buffer GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for allocating `Owned<T>` values reclaimed by the collector thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
