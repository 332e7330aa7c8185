//! Process-wide allocation tracking.
//!
//! `TrackingAllocator` wraps a real allocator and samples allocations by
//! byte count. Every sampled allocation records its call stack and bumps the
//! alloc counters of that stack's bucket; freeing a sampled allocation bumps
//! the free counters.
//!
//! Counters land in a bucket's *pending* half first. A collection cycle moves
//! pending counters into the *published* half and increments the cycle
//! counter, so the profile table only ever changes on cycle boundaries. A
//! background driver thread runs a cycle whenever enough bytes have been
//! allocated since the last one, or when too much time has passed.
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator::system();
//!
//! let runtime = TrackingRuntime::install(TrackerConfig::from_env());
//! ```

use super::record::{AllocRecord, StackSignature};
use super::MemRuntime;
use crate::utils::config::{
    CYCLE_POLL_INTERVAL, DEFAULT_CYCLE_TRIGGER_BYTES, DEFAULT_MAX_CYCLE_INTERVAL,
    DEFAULT_SAMPLE_RATE, DEFAULT_STACK_SKIP, ENV_CYCLE_BYTES, ENV_CYCLE_MS, ENV_SAMPLE_RATE,
};
use backtrace::trace_unsynchronized;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Tuning for the tracker and its cycle driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Average bytes between sampled allocations (1 samples everything)
    pub sample_rate: u64,

    /// Bytes allocated since the last cycle that trigger a new one
    pub cycle_trigger_bytes: u64,

    /// Longest time between two cycles
    pub max_cycle_interval: Duration,

    /// Innermost frames dropped from every captured stack
    pub stack_skip: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            cycle_trigger_bytes: DEFAULT_CYCLE_TRIGGER_BYTES,
            max_cycle_interval: DEFAULT_MAX_CYCLE_INTERVAL,
            stack_skip: DEFAULT_STACK_SKIP,
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `PPROF_GARBAGE_*` environment variables.
    /// Unparsable or zero values are ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_rate: env_u64(ENV_SAMPLE_RATE).unwrap_or(defaults.sample_rate),
            cycle_trigger_bytes: env_u64(ENV_CYCLE_BYTES).unwrap_or(defaults.cycle_trigger_bytes),
            max_cycle_interval: env_u64(ENV_CYCLE_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_cycle_interval),
            stack_skip: defaults.stack_skip,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u64) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn with_cycle_trigger_bytes(mut self, bytes: u64) -> Self {
        self.cycle_trigger_bytes = bytes;
        self
    }

    pub fn with_max_cycle_interval(mut self, interval: Duration) -> Self {
        self.max_cycle_interval = interval;
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    alloc_bytes: i64,
    free_bytes: i64,
    alloc_objects: i64,
    free_objects: i64,
}

impl Counts {
    fn add(&mut self, other: &Counts) {
        self.alloc_bytes += other.alloc_bytes;
        self.free_bytes += other.free_bytes;
        self.alloc_objects += other.alloc_objects;
        self.free_objects += other.free_objects;
    }

    fn is_zero(&self) -> bool {
        self.alloc_objects == 0 && self.free_objects == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    pending: Counts,
    published: Counts,
}

#[derive(Clone, Copy)]
struct SampledAllocation {
    stack: StackSignature,
    size: i64,
}

struct Tracker {
    config: TrackerConfig,
    hooked: AtomicBool,
    num_gc: AtomicU32,
    allocated_since_cycle: AtomicU64,
    cycle_lock: Mutex<()>,
    live: DashMap<usize, SampledAllocation>,
    buckets: DashMap<StackSignature, Bucket>,
}

impl Tracker {
    fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            hooked: AtomicBool::new(false),
            num_gc: AtomicU32::new(0),
            allocated_since_cycle: AtomicU64::new(0),
            cycle_lock: Mutex::new(()),
            live: DashMap::new(),
            buckets: DashMap::new(),
        }
    }

    fn on_alloc(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() {
            return;
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        if !self.hooked.load(Ordering::Relaxed) {
            self.hooked.store(true, Ordering::Relaxed);
        }
        self.allocated_since_cycle
            .fetch_add(size as u64, Ordering::Relaxed);

        if !should_sample(size as u64, self.config.sample_rate) {
            return;
        }

        let stack = self.capture_stack();
        let size = size as i64;
        // The address may still be tracked if its previous owner was freed
        // through a path we did not see.
        self.forget(ptr as usize);
        self.live
            .insert(ptr as usize, SampledAllocation { stack, size });

        let mut bucket = self.buckets.entry(stack).or_default();
        bucket.pending.alloc_bytes += size;
        bucket.pending.alloc_objects += 1;
    }

    fn on_free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        self.forget(ptr as usize);
    }

    fn forget(&self, ptr: usize) {
        let Some((_, sampled)) = self.live.remove(&ptr) else {
            return;
        };
        if let Some(mut bucket) = self.buckets.get_mut(&sampled.stack) {
            bucket.pending.free_bytes += sampled.size;
            bucket.pending.free_objects += 1;
        }
    }

    fn capture_stack(&self) -> StackSignature {
        let mut stack = StackSignature::default();
        let mut skip = self.config.stack_skip;
        // SAFETY: we only walk the current thread's stack and never
        // symbolize here, so no other backtrace state is touched.
        unsafe {
            trace_unsynchronized(|frame| {
                let ip = frame.ip() as usize;
                if ip == 0 {
                    return true;
                }
                if skip > 0 {
                    skip -= 1;
                    return true;
                }
                stack.push(ip)
            });
        }
        stack
    }

    /// One collection cycle: publish pending counters, then bump the counter
    fn collect(&self) {
        let _cycle = self.cycle_lock.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = ReentryGuard::enter();

        for mut bucket in self.buckets.iter_mut() {
            let pending = std::mem::take(&mut bucket.pending);
            bucket.published.add(&pending);
        }
        self.allocated_since_cycle.store(0, Ordering::Relaxed);
        self.num_gc.fetch_add(1, Ordering::Release);
    }

    fn copy_table(&self, records: &mut [AllocRecord]) -> (usize, bool) {
        // A snapshot never sees a cycle half published.
        let _cycle = self.cycle_lock.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = ReentryGuard::enter();

        let mut n = 0;
        for entry in self.buckets.iter() {
            let published = entry.value().published;
            if published.is_zero() {
                continue;
            }
            if let Some(slot) = records.get_mut(n) {
                *slot = AllocRecord {
                    alloc_bytes: published.alloc_bytes,
                    free_bytes: published.free_bytes,
                    alloc_objects: published.alloc_objects,
                    free_objects: published.free_objects,
                    stack: *entry.key(),
                };
            }
            n += 1;
        }
        (n, n <= records.len())
    }

    fn needs_cycle(&self, last_cycle: Instant) -> bool {
        self.allocated_since_cycle.load(Ordering::Relaxed) >= self.config.cycle_trigger_bytes
            || last_cycle.elapsed() >= self.config.max_cycle_interval
    }
}

/// Byte-rate sampling: each thread counts down the bytes until its next
/// sample. Deterministic, so a large allocation is always sampled.
fn should_sample(size: u64, rate: u64) -> bool {
    let rate = rate.max(1) as i64;
    NEXT_SAMPLE.with(|next| {
        let remaining = next.get() - size as i64;
        if remaining > 0 {
            next.set(remaining);
            return false;
        }
        // Skip whole sample periods covered by this allocation.
        let periods = (-remaining) / rate + 1;
        next.set(remaining + periods * rate);
        true
    })
}

thread_local! {
    static IN_TRACKER_HOOK: Cell<bool> = const { Cell::new(false) };
    static NEXT_SAMPLE: Cell<i64> = const { Cell::new(0) };
}

/// Marks the current thread as inside the tracker, so allocations made by
/// the tracker itself are not tracked (and do not deadlock on its tables).
struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        IN_TRACKER_HOOK.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_TRACKER_HOOK.with(|flag| flag.set(false));
    }
}

static TRACKER: OnceLock<Tracker> = OnceLock::new();

fn tracker() -> Option<&'static Tracker> {
    TRACKER.get()
}

/// Global allocator that feeds the process-wide allocation profile.
///
/// Allocations are only recorded once `TrackingRuntime::install` has run.
pub struct TrackingAllocator<A = System> {
    inner: A,
}

impl TrackingAllocator<System> {
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

impl<A> TrackingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if let Some(tracker) = tracker() {
            tracker.on_alloc(ptr, layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if let Some(tracker) = tracker() {
            tracker.on_alloc(ptr, layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(tracker) = tracker() {
            tracker.on_free(ptr);
        }
        self.inner.dealloc(ptr, layout);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if new_ptr.is_null() {
            return new_ptr;
        }
        if let Some(tracker) = tracker() {
            tracker.on_free(ptr);
            tracker.on_alloc(new_ptr, new_size);
        }
        new_ptr
    }
}

/// Handle to the process-wide tracker, implementing `MemRuntime`
#[derive(Clone, Copy)]
pub struct TrackingRuntime {
    tracker: &'static Tracker,
}

impl TrackingRuntime {
    /// Start tracking with `config` and spawn the cycle driver.
    ///
    /// **Public** - idempotent; later calls return the running tracker and
    /// ignore their config.
    pub fn install(config: TrackerConfig) -> Self {
        let mut created = false;
        let tracker = TRACKER.get_or_init(|| {
            created = true;
            Tracker::new(config)
        });

        if created {
            info!(
                "Allocation tracking enabled (sample rate {} bytes, cycle every {} bytes or {:?})",
                tracker.config.sample_rate,
                tracker.config.cycle_trigger_bytes,
                tracker.config.max_cycle_interval
            );
            spawn_cycle_driver(tracker);
        } else {
            debug!("Allocation tracking already installed");
        }

        Self { tracker }
    }

    /// The running tracker, installing one from the environment if needed
    pub fn global() -> Self {
        Self::install(TrackerConfig::from_env())
    }

    /// Whether the tracking allocator has seen any allocation.
    ///
    /// False means `TrackingAllocator` is not the global allocator and every
    /// profile will be empty.
    pub fn is_hooked(&self) -> bool {
        self.tracker.hooked.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.tracker.config
    }
}

impl MemRuntime for TrackingRuntime {
    fn num_gc(&self) -> u32 {
        self.tracker.num_gc.load(Ordering::Acquire)
    }

    fn force_gc(&self) {
        self.tracker.collect();
    }

    fn mem_profile(&self, records: &mut [AllocRecord]) -> (usize, bool) {
        self.tracker.copy_table(records)
    }

    fn sample_rate(&self) -> u64 {
        self.tracker.config.sample_rate
    }
}

fn spawn_cycle_driver(tracker: &'static Tracker) {
    let spawned = thread::Builder::new()
        .name("pprof-garbage-cycles".to_string())
        .spawn(move || {
            let mut seen = tracker.num_gc.load(Ordering::Acquire);
            let mut last_cycle = Instant::now();
            loop {
                thread::sleep(CYCLE_POLL_INTERVAL);

                // A forced cycle restarts the interval too.
                let current = tracker.num_gc.load(Ordering::Acquire);
                if current != seen {
                    seen = current;
                    last_cycle = Instant::now();
                }

                if tracker.needs_cycle(last_cycle) {
                    tracker.collect();
                    seen = tracker.num_gc.load(Ordering::Acquire);
                    last_cycle = Instant::now();
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to start collection cycle driver, only forced cycles will run: {}", e);
    }
}
