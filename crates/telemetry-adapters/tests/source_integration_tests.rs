//! Integration tests driving sources through the public API only.
//!
//! Simulator memory is provided by `InMemorySharedMemory`, so these run on
//! every platform.

use std::time::Duration;

use simhud_telemetry_adapters::assetto_corsa::{
    GRAPHICS_MIN_SIZE, GRAPHICS_SEGMENT, PHYSICS_MIN_SIZE, PHYSICS_SEGMENT, STATIC_MIN_SIZE,
    STATIC_SEGMENT,
};
use simhud_telemetry_adapters::{
    AssettoCorsaSource, InMemorySharedMemory, SharedMemory, SourceKind, SourceOptions,
    SyntheticSource, TelemetrySource, build_source,
};

fn write_f32_le(buf: &mut [u8], offset: usize, value: f32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_i32_le(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn publish_ac(memory: &InMemorySharedMemory, gear: i32, status: i32) {
    let mut physics = vec![0u8; PHYSICS_MIN_SIZE];
    write_f32_le(&mut physics, 4, 0.6); // gas
    write_i32_le(&mut physics, 16, gear);
    write_i32_le(&mut physics, 20, 5100); // rpms
    write_f32_le(&mut physics, 24, -0.3); // steerAngle
    write_f32_le(&mut physics, 28, 97.0); // speedKmh

    let mut graphics = vec![0u8; GRAPHICS_MIN_SIZE];
    write_i32_le(&mut graphics, 4, status);

    memory.publish(PHYSICS_SEGMENT, physics);
    memory.publish(GRAPHICS_SEGMENT, graphics);
    memory.publish(STATIC_SEGMENT, vec![0u8; STATIC_MIN_SIZE]);
}

#[test]
fn assetto_corsa_lifecycle() {
    let memory = InMemorySharedMemory::new();
    let mut source = AssettoCorsaSource::with_memory(memory.clone(), Duration::ZERO);

    // Game not running.
    assert!(source.update().is_empty());
    assert!(!source.connected());

    // Game starts, player in a replay.
    publish_ac(&memory, 3, 1);
    let replay = source.update();
    assert!(source.connected());
    assert_eq!(replay.gear, 2);
    assert!(!replay.active);

    // Player goes live.
    assert!(memory.write(GRAPHICS_SEGMENT, 4, &2i32.to_le_bytes()));
    let live = source.update();
    assert!(live.active);
    assert!((live.speed_kph - 97.0).abs() < f32::EPSILON);
    assert!((live.steering_angle - 0.3).abs() < f32::EPSILON);

    // Game exits.
    memory.remove(PHYSICS_SEGMENT);
    assert!(source.update().is_empty());
    assert!(!source.connected());
}

#[test]
fn in_memory_segments_open_by_name() {
    let memory = InMemorySharedMemory::new();
    publish_ac(&memory, 1, 2);
    for name in [PHYSICS_SEGMENT, GRAPHICS_SEGMENT, STATIC_SEGMENT] {
        assert!(matches!(memory.open(name, 1), Ok(_)), "{name} should open");
    }
}

#[test]
fn registry_sources_never_panic_without_simulators() {
    let options = SourceOptions {
        reconnect_interval: Duration::ZERO,
        synthetic_seed: Some(9),
    };
    for kind in SourceKind::ALL {
        let mut source = build_source(kind, &options);
        for _ in 0..5 {
            let snapshot = source.update();
            assert!((0.0..=1.0).contains(&snapshot.throttle));
        }
    }
}

#[test]
fn synthetic_source_outputs_live_frames() {
    let mut source = SyntheticSource::with_seed(1);
    for _ in 0..10 {
        let snapshot = source.update();
        assert!(snapshot.active);
        assert!(snapshot.rpm >= 1000.0);
    }
}
