//! Synthetic allocation workload.
//!
//! Three threads with distinct call sites:
//! - `churn_large` allocates a large buffer and drops it right away
//! - `churn_small` does the same with a smaller buffer at a slower pace
//! - `retain` allocates buffers and keeps them
//!
//! A garbage profile of this process should blame the first two sites and
//! report nothing (or zero) for the third.

use log::{debug, info};
use std::hint::black_box;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const PAGE: usize = 4096;

/// Buffer sizes and pacing of the three workload threads
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub large_bytes: usize,
    pub large_pause: Duration,
    pub small_bytes: usize,
    pub small_pause: Duration,
    pub retained_bytes: usize,
    pub retain_pause: Duration,
    /// The retaining thread stops allocating once it holds this much
    pub retain_limit: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            large_bytes: 10 << 20,
            large_pause: Duration::from_micros(10),
            small_bytes: 1 << 20,
            small_pause: Duration::from_millis(10),
            retained_bytes: 1 << 20,
            retain_pause: Duration::from_millis(1),
            retain_limit: 256 << 20,
        }
    }
}

/// Running workload threads
pub struct Workload {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Workload {
    /// Start the three workload threads
    ///
    /// **Public** - used by `capture`, `serve --workload` and the end-to-end test
    pub fn spawn(config: WorkloadConfig) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut workload = Self {
            stop: Arc::clone(&stop),
            handles: Vec::with_capacity(3),
        };

        let (large, pause) = (config.large_bytes, config.large_pause);
        workload.start("workload-large", move || churn_large(large), pause)?;

        let (small, pause) = (config.small_bytes, config.small_pause);
        workload.start("workload-small", move || churn_small(small), pause)?;

        // Room for every retained buffer up front, so growing the holder
        // never shows up as garbage.
        let limit = config.retain_limit / config.retained_bytes.max(1);
        let mut hold: Vec<Vec<u8>> = Vec::with_capacity(limit);
        let retained = config.retained_bytes;
        workload.start(
            "workload-retain",
            move || {
                if hold.len() < limit {
                    hold.push(retain(retained));
                }
            },
            config.retain_pause,
        )?;

        info!(
            "Workload started: churn {} and {} bytes, retain {} bytes (up to {} buffers)",
            config.large_bytes, config.small_bytes, config.retained_bytes, limit
        );
        Ok(workload)
    }

    fn start<F>(&mut self, name: &str, mut step: F, pause: Duration) -> io::Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                step();
                thread::sleep(pause);
            }
        })?;
        self.handles.push(handle);
        Ok(())
    }

    /// Signal every thread and wait for it to exit
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                debug!("Workload thread panicked");
            }
        }
    }
}

impl Drop for Workload {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// Write one byte per page so the buffer is really backed by memory.
fn touch(buf: &mut [u8]) {
    for i in (0..buf.len()).step_by(PAGE) {
        buf[i] = i as u8;
    }
}

#[inline(never)]
pub fn churn_large(len: usize) {
    let mut buf = vec![0u8; len];
    touch(&mut buf);
    black_box(&buf);
}

#[inline(never)]
pub fn churn_small(len: usize) {
    let mut buf = vec![0u8; len];
    touch(&mut buf);
    black_box(&buf);
}

#[inline(never)]
pub fn retain(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    touch(&mut buf);
    black_box(buf)
}
