use pprof_garbage::client::ProfileClient;
use pprof_garbage::http::router_with;
use pprof_garbage::parser::parse_heap_profile;
use pprof_garbage::runtime::{AllocRecord, Frame, MemRuntime, StackSignature, Symbolizer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// One site that frees 1 KiB more every cycle; every counter read is a new cycle.
#[derive(Clone, Default)]
struct Steady {
    cycles: Arc<AtomicU32>,
}

impl MemRuntime for Steady {
    fn num_gc(&self) -> u32 {
        self.cycles.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn force_gc(&self) {}

    fn mem_profile(&self, records: &mut [AllocRecord]) -> (usize, bool) {
        let Some(slot) = records.first_mut() else {
            return (1, false);
        };
        let n = i64::from(self.cycles.load(Ordering::SeqCst));
        let mut record = AllocRecord::new(StackSignature::from_frames(&[0xabc0]));
        record.alloc_objects = n + 1;
        record.alloc_bytes = (n + 1) * 1024;
        record.free_objects = n;
        record.free_bytes = n * 1024;
        *slot = record;
        (1, true)
    }

    fn sample_rate(&self) -> u64 {
        1024
    }
}

struct Named;

impl Symbolizer for Named {
    fn symbolize(&self, pc: usize) -> Frame {
        Frame {
            pc,
            function: Some("service::render".to_string()),
            entry: Some(pc),
            file: Some("src/render.rs".to_string()),
            line: Some(3),
        }
    }
}

#[test]
fn test_fetch_from_served_route() {
    let (addr_tx, addr_rx) = mpsc::channel();
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            let app = router_with(Steady::default(), Arc::new(Named));
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = addr_rx.recv().unwrap();

    let client = ProfileClient::new(&addr.to_string()).unwrap();
    let body = client.fetch_garbage(1, true).unwrap();

    let profile = parse_heap_profile(&body).unwrap();
    assert_eq!(profile.header.rate, 2048);
    assert_eq!(profile.samples.len(), 1);
    assert_eq!(profile.samples[0].addresses, vec![0xabc0]);
    assert!(profile.samples[0].counts.alloc_bytes > 0);
    assert_eq!(
        profile.samples[0].frames[0].function.as_deref(),
        Some("service::render")
    );
    assert!(profile.is_consistent());
}
