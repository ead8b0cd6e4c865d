//! End-to-end flows across the directory, sources, and relays, including
//! concurrent interaction between a tick thread and an interactive thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use teleport_core::{
    Directory, Indicator, Label, NUM_TELEPORT_PORTS, PORT_MAX_CHANNELS, PortReader, RelayEndpoint,
    RelayState, SourceEndpoint, SourceState,
};

/// Minimal host wiring stand-in: every port mono, port 0 carries `value`.
struct MonoPatch {
    value: f32,
}

impl PortReader for MonoPatch {
    fn channel_count(&self, port: usize) -> usize {
        if port == 0 { 1 } else { 0 }
    }

    fn voltage(&self, port: usize, channel: usize) -> f32 {
        if port == 0 && channel == 0 {
            self.value
        } else {
            0.0
        }
    }

    fn is_connected(&self, port: usize) -> bool {
        port == 0
    }
}

#[test]
fn worked_example() {
    let directory = Arc::new(Directory::new());

    // Create source A with an auto-generated label
    let a = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
    let auto_label = a.label();

    // A relay created while A exists defaults to A's label; retarget it to
    // nothing to start from the unbound state of the example.
    let relay = RelayEndpoint::create(Arc::clone(&directory));
    relay.set_target(None);
    relay.tick();
    assert!(!relay.source_valid());
    for i in 0..NUM_TELEPORT_PORTS {
        assert_eq!(relay.voltage(i, 0), 0.0);
        assert_eq!(relay.indicator(i), Indicator::Off);
    }

    // Bind the relay to A; next tick mirrors A's current values
    a.publish(&MonoPatch { value: 4.25 });
    relay.set_target(Some(auto_label.clone()));
    relay.tick();
    assert!(relay.source_valid());
    assert_eq!(relay.voltage(0, 0), 4.25);

    // Rename A; the relay still targets the old label and unbinds
    assert!(a.rename("abcd"));
    relay.tick();
    assert!(!relay.source_valid());
    assert_eq!(relay.target(), Some(auto_label));

    // A second source claims the old label; renaming A onto it must fail
    let old_text = relay.target().unwrap().as_str().to_owned();
    let b = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
    assert!(b.rename(&old_text));
    assert!(!a.rename(&old_text));
    assert_eq!(a.label(), Label::parse("abcd").unwrap());

    // And the relay now resolves B under the old label
    b.publish(&MonoPatch { value: -1.0 });
    relay.tick();
    assert!(relay.source_valid());
    assert_eq!(relay.voltage(0, 0), -1.0);
}

#[test]
fn uniqueness_under_create_and_rename() {
    let directory = Arc::new(Directory::new());
    let mut sources = Vec::new();
    for _ in 0..32 {
        sources.push(SourceEndpoint::create(Arc::clone(&directory)).unwrap());
    }

    // Everyone tries to claim the same label; exactly one succeeds
    let winners: Vec<bool> = sources.iter().map(|s| s.rename("dupe")).collect();
    assert_eq!(winners.iter().filter(|w| **w).count(), 1);

    // At any observation point, live labels are pairwise distinct
    let mut labels: Vec<_> = sources.iter().map(|s| s.label()).collect();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), sources.len());
}

#[test]
fn persistence_roundtrip_through_json() {
    let directory = Arc::new(Directory::new());
    let source = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
    assert!(source.rename("k3Qz"));
    let relay = RelayEndpoint::create(Arc::clone(&directory));
    relay.set_target(Some(source.label()));

    let source_json = serde_json::to_value(source.save()).unwrap();
    let relay_json = serde_json::to_value(relay.save()).unwrap();
    assert_eq!(source_json["label"], "k3Qz");
    assert_eq!(relay_json["label"], "k3Qz");

    // Load into a fresh process-wide directory
    let directory2 = Arc::new(Directory::new());
    let source2 = SourceEndpoint::restore(
        Arc::clone(&directory2),
        &SourceState::from_value(&source_json),
    )
    .unwrap();
    let relay2 = RelayEndpoint::restore(
        Arc::clone(&directory2),
        &RelayState::from_value(&relay_json),
    );
    assert_eq!(source2.label().as_str(), "k3Qz");
    assert_eq!(relay2.target(), Some(source2.label()));

    source2.publish(&MonoPatch { value: 2.0 });
    relay2.tick();
    assert!(relay2.source_valid());
    assert_eq!(relay2.voltage(0, 0), 2.0);
}

#[test]
fn duplicate_restore_gets_fresh_label() {
    let directory = Arc::new(Directory::new());
    let original = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
    assert!(original.rename("k3Qz"));

    // Duplicating an instance replays its saved state into the same
    // directory; the duplicate must not displace the original.
    let state = original.save();
    let duplicate = SourceEndpoint::restore(Arc::clone(&directory), &state).unwrap();
    assert_ne!(duplicate.label(), original.label());
    assert_eq!(directory.labels().len(), 2);
}

/// Rename a source back and forth while a tick thread hammers resolution.
/// The tick must only ever observe the old mapping or the new one: a
/// resolved source is always readable, and a miss is a clean miss.
#[test]
fn rename_atomicity_under_concurrent_ticks() {
    let directory = Arc::new(Directory::new());
    let source = Arc::new(SourceEndpoint::create(Arc::clone(&directory)).unwrap());
    assert!(source.rename("aaa1"));
    source.publish(&MonoPatch { value: 7.0 });

    let relay = Arc::new(RelayEndpoint::create(Arc::clone(&directory)));
    relay.set_target(Some(Label::parse("aaa1").unwrap()));

    let stop = Arc::new(AtomicBool::new(false));

    let tick_thread = {
        let relay = Arc::clone(&relay);
        let directory = Arc::clone(&directory);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let l1 = Label::parse("aaa1").unwrap();
            let l2 = Label::parse("bbb2").unwrap();
            while !stop.load(Ordering::Relaxed) {
                relay.tick();
                if relay.source_valid() {
                    assert_eq!(relay.voltage(0, 0), 7.0);
                }
                // A resolved handle is always readable; exactly one of the
                // two labels can resolve at this instant, never a torn
                // half-rename.
                for label in [&l1, &l2] {
                    if let Some(resolved) = directory.resolve(label) {
                        assert_eq!(resolved.snapshot().port(0).get(0), 7.0);
                    }
                }
            }
        })
    };

    for _ in 0..2_000 {
        assert!(source.rename("bbb2"));
        assert!(source.rename("aaa1"));
    }
    stop.store(true, Ordering::Relaxed);
    tick_thread.join().unwrap();
}

/// Create and destroy sources from the interactive thread while a relay
/// ticks against their label; the relay must see either live values or the
/// fallback, never a crash or a frozen stale value.
#[test]
fn destruction_safety_under_concurrent_ticks() {
    let directory = Arc::new(Directory::new());
    let relay = Arc::new(RelayEndpoint::create(Arc::clone(&directory)));
    relay.set_target(Some(Label::parse("hot1").unwrap()));

    let stop = Arc::new(AtomicBool::new(false));
    let tick_thread = {
        let relay = Arc::clone(&relay);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                relay.tick();
                if relay.source_valid() {
                    assert_eq!(relay.voltage(0, 0), 9.0);
                } else {
                    assert_eq!(relay.voltage(0, 0), 0.0);
                    assert_eq!(relay.channels(0), 1);
                }
            }
        })
    };

    for _ in 0..500 {
        let source = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
        // Publish before taking the hot label so the relay can never
        // resolve an unpublished bank
        source.publish(&MonoPatch { value: 9.0 });
        assert!(source.rename("hot1"));
        drop(source);
    }
    stop.store(true, Ordering::Relaxed);
    tick_thread.join().unwrap();

    // After the last destruction the relay settles on the fallback
    relay.tick();
    assert!(!relay.source_valid());
}

#[test]
fn poly_channel_counts_propagate() {
    struct WidePatch;
    impl PortReader for WidePatch {
        fn channel_count(&self, port: usize) -> usize {
            (port + 1).min(PORT_MAX_CHANNELS)
        }
        fn voltage(&self, port: usize, channel: usize) -> f32 {
            (port * 100 + channel) as f32
        }
        fn is_connected(&self, _port: usize) -> bool {
            true
        }
    }

    let directory = Arc::new(Directory::new());
    let source = SourceEndpoint::create(Arc::clone(&directory)).unwrap();
    let relay = RelayEndpoint::create(Arc::clone(&directory));

    source.publish(&WidePatch);
    relay.tick();

    for port in 0..NUM_TELEPORT_PORTS {
        assert_eq!(relay.channels(port), port + 1);
        for channel in 0..(port + 1) {
            assert_eq!(relay.voltage(port, channel), (port * 100 + channel) as f32);
        }
        assert_eq!(relay.indicator(port), Indicator::Connected);
    }
}
