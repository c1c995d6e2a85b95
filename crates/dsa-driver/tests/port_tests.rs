// SPDX-License-Identifier: AGPL-3.0-only

//! Port validation tests
//!
//! Hardware tests are ignored by default; the simulated port runs everywhere.

use dsa_driver::{
    reference_dot, select_port, Accelerator, AcceleratorPort, DotProduct, HandshakeConfig,
    PortSelection, PortType, SimulatedPort,
};
use std::time::Duration;

#[test]
fn test_simulated_port_selection() {
    let port = select_port(&PortSelection::Simulated).expect("Simulated port init");
    assert_eq!(port.port_type(), PortType::Simulated);

    let mut acc = Accelerator::new(port);
    let out = acc.dot(&[0.5, 0.25], &[2.0, 4.0]).expect("dot");
    assert!((out - 2.0).abs() < f32::EPSILON);
}

#[test]
fn test_boxed_port_reports_stats() {
    let mut acc = Accelerator::new(select_port(&PortSelection::Simulated).unwrap());
    for _ in 0..10 {
        acc.dot(&[1.0], &[1.0]).unwrap();
    }
    assert_eq!(acc.stats().requests, 10);
    acc.reset_stats();
    assert_eq!(acc.stats().requests, 0);
}

#[test]
#[ignore] // Requires hardware
fn test_mmio_port() {
    let port = select_port(&PortSelection::default()).expect("MMIO port init");
    assert_eq!(port.port_type(), PortType::Mmio);
    println!("MMIO port: capacity {}", port.capacity());
}

#[test]
#[ignore] // Requires hardware
fn test_mmio_matches_simulation() {
    let config = HandshakeConfig::default().with_timeout(Duration::from_millis(100));
    let mut hw = Accelerator::new(select_port(&PortSelection::default()).expect("MMIO port"))
        .with_config(config);
    let mut sim = Accelerator::new(SimulatedPort::new()).with_config(config);

    let v: Vec<f32> = (0..784).map(|i| (i % 255) as f32 / 255.0).collect();
    let w: Vec<f32> = (0..784).map(|i| ((i * 37) % 17) as f32 / 17.0 - 0.5).collect();

    let hw_out = hw.dot(&v, &w).expect("hardware dot");
    let sim_out = sim.dot(&v, &w).expect("simulated dot");
    let reference = reference_dot(&v, &w);

    // hardware may accumulate in a different order
    let tolerance = 1e-3 * reference.abs().max(1.0);
    assert!((hw_out - sim_out).abs() < tolerance, "hw={hw_out} sim={sim_out}");
    println!("✅ MMIO and simulated accelerator agree: {hw_out}");
}
