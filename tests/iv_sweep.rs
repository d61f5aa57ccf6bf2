//! End-to-end IV sweep against the scripted mock transport.

use keithley2400::transport::MockTransport;
use keithley2400::{MeasureKind, SaveMode, Session, SourceKind, SweepSpec};
use std::time::Duration;

/// Build a flat `TRACE:DATA?` response from `(volts, amps)` pairs.
fn flat_response(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(i, (v, a))| format!("{v},{a},{},{},0", v / a, i as f64 * 0.1))
        .collect::<Vec<_>>()
        .join(",")
}

fn spec() -> SweepSpec {
    SweepSpec {
        kind: SourceKind::Voltage,
        start: -0.01,
        stop: 0.01,
        step: 0.01,
        delay: 0.0,
    }
}

async fn scripted_session() -> Session<MockTransport> {
    let mut transport = MockTransport::new();
    transport.set_response("SOURCE:FUNCTION:MODE?", "VOLT");
    transport.set_response("STATUS:MEASUREMENT?", "0");
    transport.queue_response(
        "TRACE:DATA?",
        &flat_response(&[(-0.01, -1e-6), (0.0, 1e-9), (0.01, 1e-6)]),
    );
    transport.queue_response(
        "TRACE:DATA?",
        &flat_response(&[(0.01, 1e-6), (0.0, 1e-9), (-0.01, -1e-6)]),
    );
    Session::open(transport).await.unwrap()
}

#[tokio::test]
async fn double_leg_sweep_accumulates_both_legs() {
    let mut session = scripted_session().await;
    session
        .configure_measure(MeasureKind::Current)
        .await
        .unwrap();

    session
        .run_iv_sweep(&spec(), Duration::ZERO)
        .await
        .unwrap();

    let trace = session.trace();
    assert_eq!(trace.len(), 6);
    assert_eq!(trace.volts()[0], -0.01);
    assert_eq!(trace.volts()[2], 0.01);
    // return leg retraces in reverse
    assert_eq!(trace.volts()[3], 0.01);
    assert_eq!(trace.volts()[5], -0.01);
}

#[tokio::test]
async fn sweep_ramps_on_before_sweeping_and_off_after() {
    let mut session = scripted_session().await;
    session
        .run_iv_sweep(&spec(), Duration::ZERO)
        .await
        .unwrap();

    let transport = session.transport_mut();
    // ramp to the starting bias happens before the sweep is programmed
    let first_level = transport.position_of("SOURCE:VOLTAGE:LEVEL").unwrap();
    let sweep_mode = transport.position_of("SOURCE:VOLTAGE:MODE SWEEP").unwrap();
    assert!(first_level < sweep_mode);
    // both legs waited on the instrument
    assert_eq!(transport.srq_waits(), 2);
    // output ends up off
    assert_eq!(transport.log().last().map(String::as_str), Some("STATUS:MEASUREMENT?"));
    assert!(transport.count_matching("OUTPUT OFF") >= 1);
}

#[tokio::test]
async fn both_legs_program_the_same_point_count() {
    let mut session = scripted_session().await;
    session
        .run_iv_sweep(&spec(), Duration::ZERO)
        .await
        .unwrap();

    let transport = session.transport_mut();
    assert_eq!(transport.count_matching("TRIGGER:COUNT 3"), 2);
    assert_eq!(transport.count_matching("TRACE:POINTS 3"), 2);
    // second leg steps downward
    assert_eq!(transport.count_matching("SOURCE:VOLTAGE:STEP -0.01"), 1);
}

#[tokio::test]
async fn saved_sweep_gets_an_incremented_file() {
    let mut session = scripted_session().await;
    session
        .run_iv_sweep(&spec(), Duration::ZERO)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = session
        .save(dir.path(), "ivSweep.txt", SaveMode::Increment)
        .unwrap();
    assert_eq!(path.file_name().unwrap(), "ivSweep0001.txt");
    let contents = std::fs::read_to_string(path).unwrap();
    // blank line, two header rows, six data rows
    assert_eq!(contents.lines().count(), 9);
}
